//! Runtime Builder API
//!
//! Wires the whole demo device: shared resources, the seven periodic tasks,
//! the two modes, the vsync ticker and the mode controller task. Consumers
//! (CLI, tests) plug in collaborators and get back a `RuntimeHandle`.

use std::sync::Arc;

use framepace_core::{
    BoundedQueue, CollisionHook, FramepaceError, FramepaceResult, LineFramer, ModeId, Priority,
    RuntimeStats, SchedulerConfig, Signal, StartupError, StatsSnapshot, SyncError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::collaborators::{
    ChannelInput, InputSender, InputSource, LineSink, Renderer, TracingLineSink,
    TracingMessageSink, TracingRenderer, TracingSoundHook,
};
use crate::mode::{ModeController, ModeControllerTask, ModeRequester, ModeSpec};
use crate::supervisor::Supervisor;
use crate::tasks::simulation::SimulationHooks;
use crate::tasks::{
    BallKickTask, BallSimulationTask, BallSlot, GnssSourceTask, HeartbeatTask, IdleDisplayTask,
    LineConsumerTask, MessageRoute, NmeaFramerTask, TaskSpec, TaskStatus, TaskTable, Timing,
};
use crate::vsync::VsyncTicker;

/// Task names, in creation order
pub mod task_names {
    pub const IDLE_DISPLAY: &str = "idle-display";
    pub const BALL_SIMULATION: &str = "ball-simulation";
    pub const BALL_KICK: &str = "ball-kick";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const GNSS_SOURCE: &str = "gnss-source";
    pub const NMEA_FRAMER: &str = "nmea-framer";
    pub const LINE_CONSUMER: &str = "line-consumer";
}

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

pub struct RuntimeBuilder {
    config: SchedulerConfig,
    renderer: Arc<dyn Renderer>,
    input: Option<Arc<dyn InputSource>>,
    console: Arc<dyn LineSink>,
    routes: Vec<MessageRoute>,
    collision_hook: Option<Arc<dyn CollisionHook>>,
    initial_mode: Option<ModeId>,
    shutdown_grace: Duration,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl RuntimeBuilder {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            renderer: Arc::new(TracingRenderer),
            input: None,
            console: Arc::new(TracingLineSink),
            routes: default_routes(),
            collision_hook: Some(Arc::new(TracingSoundHook::default())),
            initial_mode: None,
            shutdown_grace: Duration::from_secs(2),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the default channel input (whose sender the handle exposes)
    pub fn with_input(mut self, input: Arc<dyn InputSource>) -> Self {
        self.input = Some(input);
        self
    }

    /// Where framed lines and the heartbeat marker are printed
    pub fn with_console(mut self, console: Arc<dyn LineSink>) -> Self {
        self.console = console;
        self
    }

    pub fn with_routes(mut self, routes: Vec<MessageRoute>) -> Self {
        self.routes = routes;
        self
    }

    pub fn add_route(mut self, route: MessageRoute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_collision_hook(mut self, hook: Arc<dyn CollisionHook>) -> Self {
        self.collision_hook = Some(hook);
        self
    }

    pub fn without_collision_hook(mut self) -> Self {
        self.collision_hook = None;
        self
    }

    /// Mode entered right after startup; by default no mode is active
    pub fn initial_mode(mut self, mode: ModeId) -> Self {
        self.initial_mode = Some(mode);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Create every resource and task, register the modes and start ticking
    pub async fn build_and_start(self) -> FramepaceResult<RuntimeHandle> {
        info!("Building framepace runtime");
        self.config.validate()?;
        let config = &self.config;

        let stats = Arc::new(RuntimeStats::new());
        let frame = Arc::new(
            Signal::counting("frame", config.signal.frame_max_count, 0)
                .map_err(|e| resource_error("frame", e))?,
        );
        let queue = BoundedQueue::new("gnss-uart", config.queue.capacity)
            .map_err(|e| resource_error("gnss-uart", e))?;
        let (line_sender, line_receiver) = mpsc::channel(config.line_channel_size);
        let (mode_sender, mode_receiver) = mpsc::channel(config.mode_channel_size);
        let modes = ModeRequester::new(mode_sender);

        let (input, input_sender): (Arc<dyn InputSource>, Option<InputSender>) = match self.input {
            Some(input) => (input, None),
            None => {
                let (input, sender) = ChannelInput::new();
                (Arc::new(input), Some(sender))
            }
        };

        let ball = BallSlot::new();
        let frame_timing = Timing::Frame {
            signal: frame.clone(),
            timeout: config.signal.frame_wait_timeout(),
        };

        let specs = vec![
            TaskSpec::new(
                task_names::IDLE_DISPLAY,
                frame_timing.clone(),
                Box::new(IdleDisplayTask::new(
                    self.renderer.clone(),
                    input.clone(),
                    modes.clone(),
                    stats.clone(),
                )),
            ),
            TaskSpec::new(
                task_names::BALL_SIMULATION,
                frame_timing,
                Box::new(BallSimulationTask::new(
                    ball.clone(),
                    self.renderer.clone(),
                    input.clone(),
                    modes.clone(),
                    stats.clone(),
                    config.timing.frame_period(),
                )),
            ),
            TaskSpec::new(
                task_names::BALL_KICK,
                Timing::Fixed(config.timing.kick_period()),
                Box::new(BallKickTask::new(
                    ball.clone(),
                    input.clone(),
                    stats.clone(),
                    config.arena.max_speed,
                )),
            ),
            TaskSpec::new(
                task_names::HEARTBEAT,
                Timing::Fixed(config.timing.heartbeat_period()),
                Box::new(HeartbeatTask::new(
                    self.console.clone(),
                    self.routes.clone(),
                    stats.clone(),
                )),
            )
            .always_running(),
            TaskSpec::new(
                task_names::GNSS_SOURCE,
                Timing::Fixed(config.timing.burst_interval()),
                Box::new(GnssSourceTask::new(
                    queue.clone(),
                    config.queue.put_timeout(),
                    stats.clone(),
                )),
            )
            .with_priority(Priority::NORMAL)
            .always_running(),
            TaskSpec::new(
                task_names::NMEA_FRAMER,
                Timing::Driven,
                Box::new(NmeaFramerTask::new(
                    queue.clone(),
                    LineFramer::new(config.framer.clone()),
                    line_sender,
                    config.queue.get_timeout(),
                    stats.clone(),
                )),
            )
            .with_priority(Priority::HIGH)
            .always_running(),
            TaskSpec::new(
                task_names::LINE_CONSUMER,
                Timing::Driven,
                Box::new(LineConsumerTask::new(
                    line_receiver,
                    self.console.clone(),
                    config.timing.consumer_timeout(),
                    stats.clone(),
                )),
            )
            .with_priority(Priority::CRITICAL)
            .always_running(),
        ];

        let mut supervisor = Supervisor::start(specs, config.max_tasks, stats.clone()).await?;
        let tasks = supervisor.tasks();

        let mut controller = ModeController::new(tasks.clone(), stats.clone());
        let registered = register_modes(
            &mut controller,
            &tasks,
            SimulationHooks::new(
                ball.clone(),
                config.arena.clone(),
                config.signal.lock_timeout(),
                self.collision_hook.clone(),
            ),
        );
        if let Err(e) = registered {
            supervisor.shutdown(self.shutdown_grace).await;
            return Err(e);
        }

        let controller_handle = tokio::spawn(ModeControllerTask::new(controller, mode_receiver).run());
        let ticker_handle =
            VsyncTicker::new(frame.clone(), config.timing.frame_period()).spawn();

        let mut handle = RuntimeHandle {
            supervisor,
            tasks,
            modes,
            input: input_sender,
            frame,
            queue,
            ball,
            stats,
            controller_handle: Some(controller_handle),
            ticker_handle: Some(ticker_handle),
            shutdown_grace: self.shutdown_grace,
            running: true,
        };

        if let Some(mode) = self.initial_mode {
            if let Err(e) = handle.activate(mode).await {
                handle.shutdown().await;
                return Err(e);
            }
        }

        info!("framepace runtime started");
        Ok(handle)
    }
}

fn default_routes() -> Vec<MessageRoute> {
    vec![
        MessageRoute::new(
            Arc::new(TracingMessageSink::new("/FreeRTOS_MQ_one_1")),
            "Hello MQ one",
        ),
        MessageRoute::new(
            Arc::new(TracingMessageSink::new("/FreeRTOS_MQ_two_1")),
            "Hello MQ two",
        ),
    ]
}

fn resource_error(resource: &str, source: SyncError) -> StartupError {
    StartupError::Resource {
        resource: resource.to_string(),
        source,
    }
}

fn register_modes(
    controller: &mut ModeController,
    tasks: &TaskTable,
    simulation: SimulationHooks,
) -> FramepaceResult<()> {
    let id_of = |name: &str| {
        tasks.find(name).map(|control| control.id()).ok_or_else(|| {
            FramepaceError::from(StartupError::TaskCreation {
                task: name.to_string(),
                reason: "task missing after startup".to_string(),
            })
        })
    };

    controller.register(
        ModeSpec::new(ModeId::IDLE_DISPLAY, "idle display")
            .with_task(id_of(task_names::IDLE_DISPLAY)?),
    )?;
    controller.register(
        ModeSpec::new(ModeId::SIMULATION, "simulation")
            .with_task(id_of(task_names::BALL_SIMULATION)?)
            .with_task(id_of(task_names::BALL_KICK)?)
            .with_hooks(Arc::new(simulation)),
    )?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running scheduler
pub struct RuntimeHandle {
    supervisor: Supervisor,
    tasks: Arc<TaskTable>,
    modes: ModeRequester,
    input: Option<InputSender>,
    frame: Arc<Signal>,
    queue: BoundedQueue<u8>,
    ball: BallSlot,
    stats: Arc<RuntimeStats>,
    controller_handle: Option<JoinHandle<FramepaceResult<()>>>,
    ticker_handle: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
    running: bool,
}

impl RuntimeHandle {
    /// Enter `mode`, leaving the active one. Returns once the transition is done.
    pub async fn activate(&self, mode: ModeId) -> FramepaceResult<Option<ModeId>> {
        self.modes.activate(mode).await
    }

    pub async fn deactivate(&self, mode: ModeId) -> FramepaceResult<Option<ModeId>> {
        self.modes.deactivate(mode).await
    }

    /// Cycle to the next mode, like the state button
    pub async fn next_mode(&self) -> FramepaceResult<Option<ModeId>> {
        self.modes.next().await
    }

    /// Sender for the default channel input, `None` when a custom input was set
    pub fn input(&self) -> Option<InputSender> {
        self.input.clone()
    }

    pub fn mode_requester(&self) -> ModeRequester {
        self.modes.clone()
    }

    pub fn ball(&self) -> BallSlot {
        self.ball.clone()
    }

    pub fn tasks(&self) -> Arc<TaskTable> {
        self.tasks.clone()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.supervisor.statuses()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.running && self.supervisor.is_running()
    }

    /// Stop the mode controller and every task, then return the final counters
    pub async fn shutdown(&mut self) -> StatsSnapshot {
        if !self.running {
            return self.stats.snapshot();
        }
        info!("Shutting down framepace runtime");

        if self.modes.shutdown().await.is_err() {
            warn!("Mode controller already stopped");
        }
        if let Some(handle) = self.controller_handle.take() {
            if tokio::time::timeout(self.shutdown_grace, handle).await.is_err() {
                warn!("Mode controller did not stop in time");
            }
        }

        // Wake tasks blocked on the shared resources so they observe the stop
        self.tasks.stop_all();
        self.frame.close();
        self.queue.close();
        let aborted = self.supervisor.shutdown(self.shutdown_grace).await;
        if aborted > 0 {
            warn!("{} task(s) aborted during shutdown", aborted);
        }

        if let Some(handle) = self.ticker_handle.take() {
            handle.abort();
            let _ = handle.await;
        }

        self.running = false;
        info!("framepace runtime shut down");
        self.stats.snapshot()
    }
}

/// Runtime with fast clocks for tests
pub async fn create_test_runtime() -> FramepaceResult<RuntimeHandle> {
    RuntimeBuilder::new(SchedulerConfig::testing())
        .shutdown_grace(Duration::from_millis(500))
        .build_and_start()
        .await
}
