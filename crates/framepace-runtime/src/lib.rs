//! framepace Runtime
//!
//! The task layer of the framepace scheduler:
//! - `RuntimeBuilder`: wires resources, tasks and modes, returns a `RuntimeHandle`
//! - `Supervisor`: all-or-nothing task startup and graceful shutdown
//! - `ModeController`: mutually exclusive modes over suspendable tasks
//! - `tasks`: the periodic loop and the demo device's seven tasks
//! - `VsyncTicker`: the simulated display refresh posting the frame signal
//!
//! Primitives (signals, queue, entity guard, framer) live in `framepace-core`.

pub mod builder;
pub mod collaborators;
pub mod mode;
pub mod supervisor;
pub mod tasks;
pub mod vsync;

pub use builder::{create_test_runtime, task_names, RuntimeBuilder, RuntimeHandle};
pub use collaborators::{
    ChannelInput, ChannelLineSink, FpsCounter, FrameView, InputEvent, InputSender, InputSource,
    LineSink, MessageSink, Renderer, Scene, TracingLineSink, TracingMessageSink, TracingRenderer,
    TracingSoundHook,
};
pub use mode::{
    ModeCommand, ModeController, ModeControllerTask, ModeHooks, ModeReply, ModeRequester,
    ModeSpec,
};
pub use supervisor::Supervisor;
pub use tasks::{
    run_periodic, BallSlot, Checkpoint, MessageRoute, PeriodicWork, RunGate, TaskControl,
    TaskDescriptor, TaskSpec, TaskStatus, TaskTable, Timing, TimingKind,
};
pub use vsync::VsyncTicker;

// Re-export core types for convenience
pub use framepace_core::{
    FramepaceError, FramepaceResult, ModeId, Priority, RunState, SchedulerConfig, StatsSnapshot,
    TaskId,
};
