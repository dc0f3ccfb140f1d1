//! Periodic Task Set
//!
//! Every task is the same perpetual loop around a `PeriodicWork`:
//!
//! 1. checkpoint: park while suspended, exit once stopped
//! 2. on resume, drop stale frame signals and let the work reset its clocks
//! 3. wait on the timing source, abandoning the wait if the run state changes
//! 4. re-check the run state; a wake that raced a suspend is dropped
//! 5. run one unit of work
//!
//! Suspension is only observed at these checkpoints, never inside a unit of
//! work, so a task is never parked while it holds the entity guard.
//!
//! Concrete tasks:
//! - `idle`: `IdleDisplayTask`
//! - `simulation`: `BallSimulationTask`, `BallKickTask`
//! - `heartbeat`: `HeartbeatTask`
//! - `gnss`: `GnssSourceTask`, `NmeaFramerTask`, `LineConsumerTask`

use std::sync::Arc;

use async_trait::async_trait;
use framepace_core::{FramepaceResult, Priority, RunState, RuntimeStats, Signal, SyncError, TaskId};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Duration, Interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

pub mod gnss;
pub mod heartbeat;
pub mod idle;
pub mod simulation;

pub use gnss::{GnssSourceTask, LineConsumerTask, NmeaFramerTask, SIMULATED_SENTENCES};
pub use heartbeat::{HeartbeatTask, MessageRoute, TICK_MARKER};
pub use idle::IdleDisplayTask;
pub use simulation::{BallKickTask, BallSimulationTask, BallSlot};

// ----------------------------------------------------------------------------
// Timing Sources
// ----------------------------------------------------------------------------

/// What a task waits on between units of work
#[derive(Debug, Clone)]
pub enum Timing {
    /// The shared frame signal, with a bounded wait
    Frame {
        signal: Arc<Signal>,
        timeout: Option<Duration>,
    },
    /// A fixed period
    Fixed(Duration),
    /// No pacing; the work blocks on its own input (queue or channel)
    Driven,
}

impl Timing {
    pub fn kind(&self) -> TimingKind {
        match self {
            Timing::Frame { .. } => TimingKind::Frame,
            Timing::Fixed(period) => TimingKind::Fixed {
                period_ms: period.as_millis() as u64,
            },
            Timing::Driven => TimingKind::Driven,
        }
    }
}

/// Serializable summary of a `Timing`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingKind {
    Frame,
    Fixed { period_ms: u64 },
    Driven,
}

enum Pacer {
    Frame {
        signal: Arc<Signal>,
        timeout: Option<Duration>,
    },
    Fixed(Interval),
    Driven,
}

impl Pacer {
    fn new(timing: Timing) -> Self {
        match timing {
            Timing::Frame { signal, timeout } => Pacer::Frame { signal, timeout },
            Timing::Fixed(period) => {
                let mut interval = time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Pacer::Fixed(interval)
            }
            Timing::Driven => Pacer::Driven,
        }
    }

    async fn wait(&mut self) -> Result<(), SyncError> {
        match self {
            Pacer::Frame { signal, timeout } => signal.wait(*timeout).await,
            Pacer::Fixed(interval) => {
                interval.tick().await;
                Ok(())
            }
            Pacer::Driven => Ok(()),
        }
    }

    /// Forget everything that accumulated while suspended. Returns the number
    /// of stale frames dropped.
    fn restart(&mut self) -> usize {
        match self {
            Pacer::Frame { signal, .. } => signal.drain(),
            Pacer::Fixed(interval) => {
                interval.reset();
                0
            }
            Pacer::Driven => 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Run State Control
// ----------------------------------------------------------------------------

/// Static description of a spawned task
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub name: String,
    pub timing: TimingKind,
    /// Advisory only; tokio does not prioritise tasks
    pub priority: Priority,
}

/// Descriptor plus the current run state, for status output
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    #[serde(flatten)]
    pub descriptor: TaskDescriptor,
    pub state: RunState,
}

/// What a task's gate observes: the run state and how many times the task
/// has been resumed. The counter survives a suspend/resume pair that the
/// watch channel coalesced into one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GateState {
    run: RunState,
    resumes: u64,
}

/// Owner side of a task's run state
#[derive(Debug)]
pub struct TaskControl {
    descriptor: TaskDescriptor,
    state: watch::Sender<GateState>,
}

impl TaskControl {
    pub fn new(descriptor: TaskDescriptor, initial: RunState) -> (Self, RunGate) {
        let (state, receiver) = watch::channel(GateState {
            run: initial,
            resumes: 0,
        });
        let gate = RunGate {
            state: receiver,
            resumes_seen: 0,
        };
        (Self { descriptor, state }, gate)
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> TaskId {
        self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().run
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus {
            descriptor: self.descriptor.clone(),
            state: self.state(),
        }
    }

    pub fn resume(&self) -> bool {
        self.transition(RunState::Running)
    }

    pub fn suspend(&self) -> bool {
        self.transition(RunState::Suspended)
    }

    pub fn stop(&self) -> bool {
        self.transition(RunState::Stopped)
    }

    // Stopped is terminal
    fn transition(&self, next: RunState) -> bool {
        let changed = self.state.send_if_modified(|gate| {
            if gate.run == RunState::Stopped || gate.run == next {
                return false;
            }
            gate.run = next;
            if next == RunState::Running {
                gate.resumes += 1;
            }
            true
        });
        if changed {
            debug!(task = %self.descriptor.name, state = %next, "run state changed");
        }
        changed
    }
}

/// Run state controls of every spawned task, in creation order
#[derive(Debug, Default)]
pub struct TaskTable {
    controls: Vec<TaskControl>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, control: TaskControl) {
        self.controls.push(control);
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskControl> {
        self.controls.iter().find(|control| control.id() == id)
    }

    pub fn find(&self, name: &str) -> Option<&TaskControl> {
        self.controls.iter().find(|control| control.name() == name)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskControl> {
        self.controls.iter()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.controls.iter().map(TaskControl::status).collect()
    }

    pub fn stop_all(&self) {
        for control in &self.controls {
            control.stop();
        }
    }
}

/// Outcome of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Continue; `resumed` is true when the task was parked on the way here
    Run { resumed: bool },
    Stop,
}

/// Task side of a run state
#[derive(Debug, Clone)]
pub struct RunGate {
    state: watch::Receiver<GateState>,
    resumes_seen: u64,
}

impl RunGate {
    pub fn is_running(&self) -> bool {
        self.state.borrow().run == RunState::Running
    }

    /// Park while suspended. `resumed` is set whenever the task was resumed
    /// since the previous checkpoint, whether or not it actually parked.
    pub async fn checkpoint(&mut self) -> Checkpoint {
        loop {
            let gate = *self.state.borrow_and_update();
            match gate.run {
                RunState::Running => {
                    let resumed = gate.resumes != self.resumes_seen;
                    self.resumes_seen = gate.resumes;
                    return Checkpoint::Run { resumed };
                }
                RunState::Stopped => return Checkpoint::Stop,
                RunState::Suspended => {
                    if self.state.changed().await.is_err() {
                        return Checkpoint::Stop;
                    }
                }
            }
        }
    }

    /// Resolve on the next run state change. False when the controller is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// True when the run state moved since the last checkpoint
    pub fn changed_since_checkpoint(&self) -> bool {
        self.state.has_changed().unwrap_or(true)
    }
}

// ----------------------------------------------------------------------------
// Periodic Work
// ----------------------------------------------------------------------------

/// One task's unit of work
#[async_trait]
pub trait PeriodicWork: Send {
    /// Called after the task is resumed, before its next wait
    async fn on_resume(&mut self) {}

    /// Do one unit of work. Errors are counted and logged; terminal errors
    /// (a closed queue or channel) end the task.
    async fn run_once(&mut self) -> FramepaceResult<()>;
}

/// Everything needed to spawn a task
pub struct TaskSpec {
    pub name: String,
    pub timing: Timing,
    pub priority: Priority,
    pub initial: RunState,
    pub work: Box<dyn PeriodicWork>,
}

impl TaskSpec {
    /// A task that starts suspended until a mode resumes it
    pub fn new<N: Into<String>>(name: N, timing: Timing, work: Box<dyn PeriodicWork>) -> Self {
        Self {
            name: name.into(),
            timing,
            priority: Priority::default(),
            initial: RunState::Suspended,
            work,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Start running immediately instead of waiting for a mode
    pub fn always_running(mut self) -> Self {
        self.initial = RunState::Running;
        self
    }
}

impl core::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("timing", &self.timing.kind())
            .field("priority", &self.priority)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// The task loop. Returns when the task is stopped or its input is closed.
pub async fn run_periodic(
    descriptor: TaskDescriptor,
    timing: Timing,
    work: Box<dyn PeriodicWork>,
    gate: RunGate,
    stats: Arc<RuntimeStats>,
) -> FramepaceResult<()> {
    let span = info_span!("task", name = %descriptor.name);
    drive(descriptor, timing, work, gate, stats)
        .instrument(span)
        .await
}

async fn drive(
    descriptor: TaskDescriptor,
    timing: Timing,
    mut work: Box<dyn PeriodicWork>,
    mut gate: RunGate,
    stats: Arc<RuntimeStats>,
) -> FramepaceResult<()> {
    info!("{} task starting", descriptor.name);
    let mut pacer = Pacer::new(timing);

    loop {
        match gate.checkpoint().await {
            Checkpoint::Stop => break,
            Checkpoint::Run { resumed: true } => {
                let stale = pacer.restart();
                if stale > 0 {
                    debug!(stale, "dropped stale frames");
                    stats.record_stale_frames(stale);
                }
                work.on_resume().await;
            }
            Checkpoint::Run { resumed: false } => {}
        }

        let woke = tokio::select! {
            biased;
            alive = gate.changed() => {
                if alive {
                    continue;
                }
                break;
            }
            woke = pacer.wait() => woke,
        };

        if let Err(e) = woke {
            if e.is_closed() {
                break;
            }
            stats.record_deadline_missed();
            warn!("{} task: {}", descriptor.name, e);
            continue;
        }

        if gate.changed_since_checkpoint() {
            debug!("wake raced a run state change, work dropped");
            continue;
        }

        if let Err(e) = work.run_once().await {
            if e.is_terminal() {
                info!("{} task input closed: {}", descriptor.name, e);
                break;
            }
            if e.is_deadline_missed() {
                stats.record_deadline_missed();
                warn!("{} task: {}", descriptor.name, e);
            } else {
                stats.record_task_error();
                error!("{} task failed: {}", descriptor.name, e);
            }
        }
    }

    info!("{} task stopped", descriptor.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};
    use framepace_core::FramepaceError;

    struct CountingWork {
        runs: Arc<AtomicU64>,
        resumes: Arc<AtomicU64>,
    }

    #[async_trait]
    impl PeriodicWork for CountingWork {
        async fn on_resume(&mut self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }

        async fn run_once(&mut self) -> FramepaceResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn descriptor(name: &str, timing: &Timing) -> TaskDescriptor {
        TaskDescriptor {
            id: TaskId::new(1),
            name: name.to_string(),
            timing: timing.kind(),
            priority: Priority::NORMAL,
        }
    }

    fn spawn_counting(
        timing: Timing,
        initial: RunState,
        stats: Arc<RuntimeStats>,
    ) -> (
        TaskControl,
        Arc<AtomicU64>,
        Arc<AtomicU64>,
        tokio::task::JoinHandle<FramepaceResult<()>>,
    ) {
        let runs = Arc::new(AtomicU64::new(0));
        let resumes = Arc::new(AtomicU64::new(0));
        let descriptor = descriptor("counting", &timing);
        let (control, gate) = TaskControl::new(descriptor.clone(), initial);
        let work = Box::new(CountingWork {
            runs: runs.clone(),
            resumes: resumes.clone(),
        });
        let handle = tokio::spawn(run_periodic(descriptor, timing, work, gate, stats));
        (control, runs, resumes, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspended_task_does_no_work() {
        let stats = Arc::new(RuntimeStats::new());
        let (control, runs, resumes, handle) = spawn_counting(
            Timing::Fixed(Duration::from_millis(10)),
            RunState::Suspended,
            stats,
        );

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert!(control.resume());
        time::sleep(Duration::from_millis(55)).await;
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
        assert!(runs.load(Ordering::SeqCst) >= 4);

        assert!(control.suspend());
        let frozen = runs.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), frozen);

        control.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_frames_dropped_on_resume() {
        let stats = Arc::new(RuntimeStats::new());
        let frame = Arc::new(Signal::counting("frame", 4, 0).unwrap());
        let timing = Timing::Frame {
            signal: frame.clone(),
            timeout: None,
        };
        let (control, runs, _resumes, handle) =
            spawn_counting(timing, RunState::Suspended, stats.clone());

        for _ in 0..4 {
            frame.post();
        }
        control.resume();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(stats.snapshot().stale_frames_dropped, 4);

        frame.post();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        control.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_suspend_resume_still_drops_stale_frames() {
        let stats = Arc::new(RuntimeStats::new());
        let frame = Arc::new(Signal::counting("frame", 4, 0).unwrap());
        let timing = Timing::Frame {
            signal: frame.clone(),
            timeout: None,
        };
        let (control, runs, resumes, handle) =
            spawn_counting(timing, RunState::Running, stats.clone());

        // Let the task park on the frame signal
        time::sleep(Duration::from_millis(1)).await;

        // The task never observes the suspended state in between
        control.suspend();
        for _ in 0..4 {
            frame.post();
        }
        control.resume();

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
        assert_eq!(stats.snapshot().stale_frames_dropped, 4);

        frame.post();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        control.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_frames_are_counted_and_task_keeps_going() {
        let stats = Arc::new(RuntimeStats::new());
        let frame = Arc::new(Signal::binary("frame", false));
        let timing = Timing::Frame {
            signal: frame.clone(),
            timeout: Some(Duration::from_millis(20)),
        };
        let (control, runs, _resumes, handle) =
            spawn_counting(timing, RunState::Running, stats.clone());

        time::sleep(Duration::from_millis(105)).await;
        assert_eq!(stats.deadlines_missed(), 5);

        frame.post();
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        control.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_frame_signal_ends_task() {
        let frame = Arc::new(Signal::binary("frame", false));
        let timing = Timing::Frame {
            signal: frame.clone(),
            timeout: None,
        };
        let (_control, _runs, _resumes, handle) =
            spawn_counting(timing, RunState::Running, Arc::new(RuntimeStats::new()));
        frame.close();
        handle.await.unwrap().unwrap();
    }

    struct FailingWork;

    #[async_trait]
    impl PeriodicWork for FailingWork {
        async fn run_once(&mut self) -> FramepaceResult<()> {
            Err(FramepaceError::task_failed("failing", "boom"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_errors_do_not_halt_the_task() {
        let stats = Arc::new(RuntimeStats::new());
        let timing = Timing::Fixed(Duration::from_millis(10));
        let descriptor = descriptor("failing", &timing);
        let (control, gate) = TaskControl::new(descriptor.clone(), RunState::Running);
        let handle = tokio::spawn(run_periodic(
            descriptor,
            timing,
            Box::new(FailingWork),
            gate,
            stats.clone(),
        ));

        time::sleep(Duration::from_millis(35)).await;
        assert_eq!(stats.snapshot().task_errors, 4);
        assert!(!handle.is_finished());

        control.stop();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_stopped_is_terminal() {
        let timing = Timing::Driven;
        let (control, gate) = TaskControl::new(descriptor("driven", &timing), RunState::Running);
        assert!(control.stop());
        assert!(!control.resume());
        assert_eq!(control.state(), RunState::Stopped);
        assert!(!gate.is_running());
    }
}
