//! Supervisor
//!
//! Spawns the periodic tasks in order and owns their join handles:
//! - startup is all or nothing: if any task cannot be created, every task
//!   created before it is aborted in reverse creation order
//! - shutdown stops every task, waits for them within a grace period and
//!   aborts whatever is left

use std::sync::Arc;

use framepace_core::{FramepaceResult, RunState, RuntimeStats, StartupError, TaskId};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::tasks::{run_periodic, TaskControl, TaskDescriptor, TaskSpec, TaskStatus, TaskTable};

type TaskHandle = JoinHandle<FramepaceResult<()>>;

// ----------------------------------------------------------------------------
// Supervisor
// ----------------------------------------------------------------------------

/// Owner of the spawned periodic tasks
#[derive(Debug)]
pub struct Supervisor {
    tasks: Arc<TaskTable>,
    handles: Vec<(String, TaskHandle)>,
    stats: Arc<RuntimeStats>,
}

impl Supervisor {
    /// Spawn `specs` in order, at most `max_tasks` of them
    pub async fn start(
        specs: Vec<TaskSpec>,
        max_tasks: usize,
        stats: Arc<RuntimeStats>,
    ) -> Result<Self, StartupError> {
        info!("Starting supervisor with {} task(s)", specs.len());

        let mut table = TaskTable::new();
        let mut handles: Vec<(String, TaskHandle)> = Vec::with_capacity(specs.len());

        for spec in specs {
            if let Err(e) = check_creation(&table, &spec, max_tasks) {
                error!("Task creation failed: {}", e);
                rollback(handles).await;
                return Err(e);
            }

            let id = TaskId::new(table.len() as u16 + 1);
            let descriptor = TaskDescriptor {
                id,
                name: spec.name.clone(),
                timing: spec.timing.kind(),
                priority: spec.priority,
            };
            let (control, gate) = TaskControl::new(descriptor.clone(), spec.initial);
            let handle = tokio::spawn(run_periodic(
                descriptor,
                spec.timing,
                spec.work,
                gate,
                stats.clone(),
            ));

            debug!(task = %spec.name, %id, state = %spec.initial, "task created");
            table.push(control);
            handles.push((spec.name, handle));
        }

        info!("All {} task(s) started", table.len());
        Ok(Self {
            tasks: Arc::new(table),
            handles,
            stats,
        })
    }

    pub fn tasks(&self) -> Arc<TaskTable> {
        self.tasks.clone()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.tasks.statuses()
    }

    pub fn stats(&self) -> Arc<RuntimeStats> {
        self.stats.clone()
    }

    /// True while at least one task loop is still alive
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|(_, handle)| !handle.is_finished())
    }

    /// Names of task loops that have exited
    pub fn finished(&self) -> Vec<&str> {
        self.handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Stop every task, then wait up to `grace` for them to exit. Returns the
    /// number of tasks that had to be aborted.
    pub async fn shutdown(&mut self, grace: Duration) -> usize {
        info!("Supervisor shutdown requested");
        self.tasks.stop_all();

        let deadline = Instant::now() + grace;
        let mut aborted = 0;
        for (name, mut handle) in self.handles.drain(..) {
            match time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(Ok(()))) => debug!(task = %name, "task exited"),
                Ok(Ok(Err(e))) => warn!("Task {} exited with error: {}", name, e),
                Ok(Err(e)) => warn!("Task {} panicked or was cancelled: {}", name, e),
                Err(_) => {
                    warn!("Task {} did not stop in time, aborting", name);
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        info!("All tasks shut down");
        aborted
    }
}

fn check_creation(table: &TaskTable, spec: &TaskSpec, max_tasks: usize) -> Result<(), StartupError> {
    if table.len() >= max_tasks {
        return Err(StartupError::TaskLimit {
            task: spec.name.clone(),
            current: table.len(),
            max: max_tasks,
        });
    }
    if table.find(&spec.name).is_some() {
        return Err(StartupError::TaskCreation {
            task: spec.name.clone(),
            reason: "a task with this name already exists".to_string(),
        });
    }
    if spec.initial == RunState::Stopped {
        return Err(StartupError::TaskCreation {
            task: spec.name.clone(),
            reason: "tasks cannot be created stopped".to_string(),
        });
    }
    Ok(())
}

/// Abort already spawned tasks, newest first, waiting for each to be dropped
async fn rollback(handles: Vec<(String, TaskHandle)>) {
    if handles.is_empty() {
        return;
    }
    warn!("Rolling back {} task(s)", handles.len());
    for (name, handle) in handles.into_iter().rev() {
        handle.abort();
        let _ = handle.await;
        debug!(task = %name, "task torn down");
    }
}
