//! Error types for framepace
//!
//! Every failure the scheduler can report falls into one of four groups:
//! resource creation failures at startup (fatal, rolled back), missed
//! deadlines on a bounded wait (recoverable), framer overflows (handled inside
//! the framer and only counted), and mode/configuration misuse.

use core::time::Duration;

use crate::types::{ModeId, TaskId};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the synchronization primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to create {resource}: {reason}")]
    CreationFailed { resource: String, reason: String },
    #[error("Deadline missed waiting on {resource} after {waited_ms}ms")]
    DeadlineMissed { resource: String, waited_ms: u64 },
    #[error("{resource} is closed")]
    Closed { resource: String },
}

impl SyncError {
    pub fn creation_failed<R: Into<String>, T: Into<String>>(resource: R, reason: T) -> Self {
        SyncError::CreationFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn deadline_missed<R: Into<String>>(resource: R, waited: Duration) -> Self {
        SyncError::DeadlineMissed {
            resource: resource.into(),
            waited_ms: waited.as_millis() as u64,
        }
    }

    pub fn closed<R: Into<String>>(resource: R) -> Self {
        SyncError::Closed {
            resource: resource.into(),
        }
    }

    /// True for the recoverable timeout case
    pub fn is_deadline_missed(&self) -> bool {
        matches!(self, SyncError::DeadlineMissed { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SyncError::Closed { .. })
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Failed to load configuration: {0}")]
    Loading(String),
}

impl ConfigError {
    pub fn invalid<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Mode controller errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("Unknown mode {mode}")]
    UnknownMode { mode: ModeId },
    #[error("Mode {mode} is already registered")]
    DuplicateMode { mode: ModeId },
    #[error("Mode {mode} is not active")]
    NotActive { mode: ModeId },
    #[error("Mode {mode} references unknown task {task}")]
    UnknownTask { mode: ModeId, task: TaskId },
    #[error("Mode {mode} hook failed: {reason}")]
    HookFailed { mode: ModeId, reason: String },
    #[error("No modes registered")]
    NoModes,
}

/// Startup (resource creation) errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to create task {task}: {reason}")]
    TaskCreation { task: String, reason: String },
    #[error("Failed to create resource {resource}: {source}")]
    Resource {
        resource: String,
        #[source]
        source: SyncError,
    },
    #[error("Task limit reached: {current}/{max} while creating {task}")]
    TaskLimit {
        task: String,
        current: usize,
        max: usize,
    },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Top-level error type for framepace
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramepaceError {
    #[error("Synchronization error: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mode error: {0}")]
    Mode(#[from] ModeError),

    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    /// Channel communication error between tasks
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// A task failed while doing its unit of work
    #[error("Task {task} failed: {reason}")]
    Task { task: String, reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl FramepaceError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        FramepaceError::Channel {
            message: message.into(),
        }
    }

    /// Create a task failure error
    pub fn task_failed<T: Into<String>, R: Into<String>>(task: T, reason: R) -> Self {
        FramepaceError::Task {
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// True when the error is a recoverable missed deadline
    pub fn is_deadline_missed(&self) -> bool {
        matches!(self, FramepaceError::Sync(e) if e.is_deadline_missed())
    }

    /// True when a resource the task depends on has been shut down, so the
    /// task should exit instead of looping
    pub fn is_terminal(&self) -> bool {
        match self {
            FramepaceError::Sync(e) => e.is_closed(),
            FramepaceError::Channel { .. } => true,
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, FramepaceError>;
pub type FramepaceResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_missed_classification() {
        let err = SyncError::deadline_missed("frame", Duration::from_millis(250));
        assert!(err.is_deadline_missed());
        assert_eq!(
            err.to_string(),
            "Deadline missed waiting on frame after 250ms"
        );

        let wrapped: FramepaceError = err.into();
        assert!(wrapped.is_deadline_missed());
        assert!(!FramepaceError::channel_error("gone").is_deadline_missed());
        assert!(FramepaceError::channel_error("gone").is_terminal());
        assert!(FramepaceError::from(SyncError::closed("uart")).is_terminal());
        assert!(!wrapped.is_terminal());
    }

    #[test]
    fn test_startup_error_names_task() {
        let err = StartupError::TaskLimit {
            task: "ball-kick".into(),
            current: 2,
            max: 2,
        };
        assert!(err.to_string().contains("ball-kick"));
    }
}
