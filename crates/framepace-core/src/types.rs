//! Core identifier and state types shared by the scheduler crates

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Task Identifier
// ----------------------------------------------------------------------------

/// Identifier of a periodic task, assigned in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u16);

impl TaskId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Mode Identifier
// ----------------------------------------------------------------------------

/// Identifier of a mode (a named configuration of running tasks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModeId(u8);

impl ModeId {
    /// Idle display: the static screen with the mouse ball and sprites
    pub const IDLE_DISPLAY: Self = Self(1);
    /// Simulation: the bouncing ball inside its walls
    pub const SIMULATION: Self = Self(2);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Task Priority
// ----------------------------------------------------------------------------

/// Advisory ordering hint. Higher is more important; the runtime does not
/// rely on it for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    pub const IDLE: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const CRITICAL: Priority = Priority(u8::MAX);
}

// ----------------------------------------------------------------------------
// Run State
// ----------------------------------------------------------------------------

/// Run state of a periodic task as requested by the mode controller.
///
/// ```text
///   Suspended ── resume() ──► Running
///       ▲                        │
///       └────── suspend() ───────┘
///   (any) ── stop() ──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// Parked at its next checkpoint, performs no work
    Suspended,
    /// Allowed to wait on its timing source and do work
    Running,
    /// Terminated, the task loop exits at its next checkpoint
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Suspended => write!(f, "suspended"),
            RunState::Running => write!(f, "running"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}
