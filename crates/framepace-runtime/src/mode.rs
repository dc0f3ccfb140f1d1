//! Mode Controller
//!
//! A mode is a named set of tasks that run together. At most one mode is
//! active. Activating a mode first exits the current one, runs the mode's
//! `init` hook on its very first entry and its `enter` hook on every entry,
//! then resumes its tasks. Deactivating suspends exactly the tasks that the
//! activation resumed.
//!
//! The controller runs as its own task fed by a bounded command channel, so
//! frame tasks can ask for a transition without waiting for it.

use std::sync::Arc;

use async_trait::async_trait;
use framepace_core::{FramepaceError, FramepaceResult, ModeError, ModeId, RuntimeStats, TaskId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::tasks::TaskTable;

// ----------------------------------------------------------------------------
// Mode Definition
// ----------------------------------------------------------------------------

/// Hooks run by the controller during a transition
#[async_trait]
pub trait ModeHooks: Send + Sync {
    /// First entry only, e.g. create the mode's entities
    async fn init(&self) -> FramepaceResult<()> {
        Ok(())
    }

    /// Every entry, e.g. reset the mode's entities
    async fn enter(&self) -> FramepaceResult<()> {
        Ok(())
    }
}

pub struct ModeSpec {
    pub id: ModeId,
    pub name: String,
    pub tasks: Vec<TaskId>,
    pub hooks: Option<Arc<dyn ModeHooks>>,
}

impl ModeSpec {
    pub fn new<N: Into<String>>(id: ModeId, name: N) -> Self {
        Self {
            id,
            name: name.into(),
            tasks: Vec::new(),
            hooks: None,
        }
    }

    pub fn with_task(mut self, task: TaskId) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ModeHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }
}

impl core::fmt::Debug for ModeSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModeSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tasks", &self.tasks)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

struct ModeEntry {
    spec: ModeSpec,
    initialized: bool,
}

struct ActiveMode {
    id: ModeId,
    resumed: Vec<TaskId>,
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

pub struct ModeController {
    tasks: Arc<TaskTable>,
    modes: Vec<ModeEntry>,
    active: Option<ActiveMode>,
    stats: Arc<RuntimeStats>,
}

impl ModeController {
    /// Controller over `tasks`. No mode is active initially.
    pub fn new(tasks: Arc<TaskTable>, stats: Arc<RuntimeStats>) -> Self {
        Self {
            tasks,
            modes: Vec::new(),
            active: None,
            stats,
        }
    }

    pub fn register(&mut self, spec: ModeSpec) -> Result<(), ModeError> {
        if self.position(spec.id).is_some() {
            return Err(ModeError::DuplicateMode { mode: spec.id });
        }
        if let Some(&task) = spec.tasks.iter().find(|id| self.tasks.get(**id).is_none()) {
            return Err(ModeError::UnknownTask {
                mode: spec.id,
                task,
            });
        }
        debug!(mode = %spec.id, name = %spec.name, tasks = spec.tasks.len(), "mode registered");
        self.modes.push(ModeEntry {
            spec,
            initialized: false,
        });
        Ok(())
    }

    pub fn active(&self) -> Option<ModeId> {
        self.active.as_ref().map(|active| active.id)
    }

    /// Registered modes in registration order
    pub fn modes(&self) -> Vec<ModeId> {
        self.modes.iter().map(|entry| entry.spec.id).collect()
    }

    fn position(&self, mode: ModeId) -> Option<usize> {
        self.modes.iter().position(|entry| entry.spec.id == mode)
    }

    /// Exit the active mode (if any) and enter `mode`. Activating the mode
    /// that is already active re-enters it.
    pub async fn activate(&mut self, mode: ModeId) -> Result<(), ModeError> {
        let index = self.position(mode).ok_or(ModeError::UnknownMode { mode })?;
        self.exit_active();

        let entry = &mut self.modes[index];
        if let Some(hooks) = entry.spec.hooks.clone() {
            if !entry.initialized {
                hooks.init().await.map_err(|e| hook_failed(mode, e))?;
                entry.initialized = true;
            }
            hooks.enter().await.map_err(|e| hook_failed(mode, e))?;
        }

        let resumed: Vec<TaskId> = entry
            .spec
            .tasks
            .iter()
            .copied()
            .filter(|id| self.tasks.get(*id).is_some_and(|control| control.resume()))
            .collect();

        info!(
            "Mode {} ({}) active, {} task(s) resumed",
            mode,
            entry.spec.name,
            resumed.len()
        );
        self.active = Some(ActiveMode { id: mode, resumed });
        self.stats.record_mode_transition();
        Ok(())
    }

    /// Leave `mode`, which must be the active one
    pub fn deactivate(&mut self, mode: ModeId) -> Result<(), ModeError> {
        if self.position(mode).is_none() {
            return Err(ModeError::UnknownMode { mode });
        }
        if self.active() != Some(mode) {
            return Err(ModeError::NotActive { mode });
        }
        self.exit_active();
        self.stats.record_mode_transition();
        Ok(())
    }

    /// Activate the mode registered after the active one, wrapping around.
    /// With no active mode the first registered mode is entered.
    pub async fn next(&mut self) -> Result<ModeId, ModeError> {
        if self.modes.is_empty() {
            return Err(ModeError::NoModes);
        }
        let index = match self.active().and_then(|id| self.position(id)) {
            Some(current) => (current + 1) % self.modes.len(),
            None => 0,
        };
        let mode = self.modes[index].spec.id;
        self.activate(mode).await?;
        Ok(mode)
    }

    /// Suspend the active mode's tasks and leave no mode active
    pub fn exit_active(&mut self) {
        if let Some(active) = self.active.take() {
            for id in &active.resumed {
                if let Some(control) = self.tasks.get(*id) {
                    control.suspend();
                }
            }
            info!("Mode {} exited", active.id);
        }
    }
}

fn hook_failed(mode: ModeId, error: FramepaceError) -> ModeError {
    ModeError::HookFailed {
        mode,
        reason: error.to_string(),
    }
}

// ----------------------------------------------------------------------------
// Controller Task
// ----------------------------------------------------------------------------

/// Reply carrying the active mode after a command
pub type ModeReply = oneshot::Sender<Result<Option<ModeId>, ModeError>>;

#[derive(Debug)]
pub enum ModeCommand {
    Activate {
        mode: ModeId,
        reply: Option<ModeReply>,
    },
    Deactivate {
        mode: ModeId,
        reply: Option<ModeReply>,
    },
    Next {
        reply: Option<ModeReply>,
    },
    Shutdown,
}

/// Cloneable sender of mode commands
#[derive(Debug, Clone)]
pub struct ModeRequester {
    sender: mpsc::Sender<ModeCommand>,
}

impl ModeRequester {
    pub fn new(sender: mpsc::Sender<ModeCommand>) -> Self {
        Self { sender }
    }

    /// Ask for the next mode without waiting; used from frame tasks.
    /// Returns false when the request could not be queued.
    pub fn request_next(&self) -> bool {
        match self.sender.try_send(ModeCommand::Next { reply: None }) {
            Ok(()) => true,
            Err(e) => {
                warn!("Mode request dropped: {}", e);
                false
            }
        }
    }

    pub async fn activate(&self, mode: ModeId) -> FramepaceResult<Option<ModeId>> {
        self.call(|reply| ModeCommand::Activate { mode, reply }).await
    }

    pub async fn deactivate(&self, mode: ModeId) -> FramepaceResult<Option<ModeId>> {
        self.call(|reply| ModeCommand::Deactivate { mode, reply })
            .await
    }

    pub async fn next(&self) -> FramepaceResult<Option<ModeId>> {
        self.call(|reply| ModeCommand::Next { reply }).await
    }

    pub async fn shutdown(&self) -> FramepaceResult<()> {
        self.sender
            .send(ModeCommand::Shutdown)
            .await
            .map_err(|_| FramepaceError::channel_error("Mode controller stopped"))
    }

    async fn call<F>(&self, command: F) -> FramepaceResult<Option<ModeId>>
    where
        F: FnOnce(Option<ModeReply>) -> ModeCommand,
    {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(Some(reply)))
            .await
            .map_err(|_| FramepaceError::channel_error("Mode controller stopped"))?;
        let result = response
            .await
            .map_err(|_| FramepaceError::channel_error("Mode controller dropped the reply"))?;
        Ok(result?)
    }
}

/// Runs a `ModeController` until shutdown
pub struct ModeControllerTask {
    controller: ModeController,
    commands: mpsc::Receiver<ModeCommand>,
}

impl ModeControllerTask {
    pub fn new(controller: ModeController, commands: mpsc::Receiver<ModeCommand>) -> Self {
        Self {
            controller,
            commands,
        }
    }

    pub async fn run(mut self) -> FramepaceResult<()> {
        info!("Mode controller task starting");

        while let Some(command) = self.commands.recv().await {
            let (result, reply) = match command {
                ModeCommand::Activate { mode, reply } => {
                    (self.controller.activate(mode).await, reply)
                }
                ModeCommand::Deactivate { mode, reply } => {
                    (self.controller.deactivate(mode), reply)
                }
                ModeCommand::Next { reply } => (self.controller.next().await.map(|_| ()), reply),
                ModeCommand::Shutdown => break,
            };

            if let Err(e) = &result {
                warn!("Mode transition failed: {}", e);
            }
            if let Some(reply) = reply {
                let _ = reply.send(result.map(|_| self.controller.active()));
            }
        }

        self.controller.exit_active();
        info!("Mode controller task stopped");
        Ok(())
    }
}
