//! framepace Core
//!
//! Building blocks for a small periodic task scheduler driving a simulated
//! device:
//! - `Signal`: binary / counting wait-gate used for frame pacing and mutual exclusion
//! - `BoundedQueue`: fixed-capacity FIFO with blocking, time-bounded put/get
//! - `EntityGuard`: one shared mutable entity paired with one mutual-exclusion signal
//! - `Ball`: the simulated bouncing ball and its collision hook
//! - `LineFramer`: reassembles delimited records from a byte stream
//!
//! The task runtime built on top of these lives in `framepace-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod entity;
pub mod errors;
pub mod framer;
pub mod monitoring;
pub mod sync;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{
    ArenaConfig, FramerConfig, QueueConfig, SchedulerConfig, SignalConfig, TimingConfig,
};
pub use entity::{
    ball::{Arena, Ball, CollisionEvent, CollisionHook, Color, Wall},
    guard::{EntityGuard, Resettable},
};
pub use errors::{
    ConfigError, FramepaceError, FramepaceResult, ModeError, StartupError, SyncError,
};
pub use framer::{FramerEvent, FramerState, FramerStats, LineFramer};
pub use monitoring::{RuntimeStats, StatsSnapshot};
pub use sync::{
    lock_unpoisoned,
    queue::BoundedQueue,
    signal::{Signal, SignalKind, SignalToken},
};
pub use types::{ModeId, Priority, RunState, TaskId};
