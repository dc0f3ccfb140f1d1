//! Synchronization primitives
//!
//! - `signal`: wait/post gate in binary or counting configuration
//! - `queue`: bounded FIFO built from two counting signals

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod queue;
pub mod signal;

pub use queue::BoundedQueue;
pub use signal::{Signal, SignalKind, SignalToken};

/// Lock a std mutex, recovering the data if a previous holder panicked.
/// The protected data is always left consistent between statements.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
