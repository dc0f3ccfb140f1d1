//! Signal Primitive
//!
//! A wait/post gate over a bounded count of available units. The same
//! contract serves two configurations:
//!
//! - **Binary** (`max = 1`): a mutual-exclusion token when created available,
//!   or a coalescing frame trigger when created empty. Posting an already
//!   available binary signal is a no-op.
//! - **Counting** (`max = n`): pending posts queue up to `n`, each wait
//!   consumes exactly one.
//!
//! Waits are bounded: a timeout surfaces as `SyncError::DeadlineMissed`
//! instead of blocking forever. Waiters are released by the tokio semaphore
//! in FIFO order, which is stronger than the "eventually one" guarantee this
//! primitive promises.

use core::time::Duration;
use std::sync::Mutex;

use tokio::sync::Semaphore;
use tracing::trace;

use super::lock_unpoisoned;
use crate::errors::SyncError;

/// Signal configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Binary,
    Counting { max: usize },
}

impl SignalKind {
    pub fn max_count(&self) -> usize {
        match self {
            SignalKind::Binary => 1,
            SignalKind::Counting { max } => *max,
        }
    }
}

/// Binary or counting wait-gate
#[derive(Debug)]
pub struct Signal {
    name: String,
    kind: SignalKind,
    units: Semaphore,
    // Serializes the saturation check in `post`
    post_lock: Mutex<()>,
}

impl Signal {
    /// Create a binary signal. `available = true` gives a free mutual-exclusion
    /// token, `false` gives an empty frame trigger.
    pub fn binary<N: Into<String>>(name: N, available: bool) -> Self {
        Self {
            name: name.into(),
            kind: SignalKind::Binary,
            units: Semaphore::new(usize::from(available)),
            post_lock: Mutex::new(()),
        }
    }

    /// Create a counting signal holding at most `max` units, `initial` of
    /// them available.
    pub fn counting<N: Into<String>>(name: N, max: usize, initial: usize) -> Result<Self, SyncError> {
        let name = name.into();
        if max == 0 {
            return Err(SyncError::creation_failed(name, "maximum count must be at least 1"));
        }
        if max > Semaphore::MAX_PERMITS {
            return Err(SyncError::creation_failed(
                name,
                format!("maximum count {} exceeds {}", max, Semaphore::MAX_PERMITS),
            ));
        }
        if initial > max {
            return Err(SyncError::creation_failed(
                name,
                format!("initial count {} exceeds maximum {}", initial, max),
            ));
        }
        let kind = if max == 1 {
            SignalKind::Binary
        } else {
            SignalKind::Counting { max }
        };
        Ok(Self {
            name,
            kind,
            units: Semaphore::new(initial),
            post_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Units currently available to waiters
    pub fn available(&self) -> usize {
        self.units.available_permits()
    }

    /// Block until one unit is available, then consume it. `None` waits forever.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<(), SyncError> {
        let acquired = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.units.acquire())
                .await
                .map_err(|_| SyncError::deadline_missed(&self.name, limit))?,
            None => self.units.acquire().await,
        };
        let permit = acquired.map_err(|_| SyncError::closed(&self.name))?;
        permit.forget();
        Ok(())
    }

    /// Consume one unit if available without blocking
    pub fn try_wait(&self) -> bool {
        match self.units.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Make one unit available. Returns `false` when the signal was already
    /// saturated and the post coalesced.
    pub fn post(&self) -> bool {
        let _serialized = lock_unpoisoned(&self.post_lock);
        if self.units.is_closed() || self.units.available_permits() >= self.kind.max_count() {
            trace!(signal = %self.name, "post coalesced");
            return false;
        }
        self.units.add_permits(1);
        true
    }

    /// Drop every pending unit, returning how many were discarded
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while self.try_wait() {
            drained += 1;
        }
        drained
    }

    /// Wait for the signal and hold it until the returned token is dropped.
    /// Intended for binary signals created available.
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<SignalToken<'_>, SyncError> {
        self.wait(timeout).await?;
        Ok(SignalToken { signal: self })
    }

    /// Wake every waiter with `SyncError::Closed`; later waits fail immediately
    pub fn close(&self) {
        self.units.close();
    }

    pub fn is_closed(&self) -> bool {
        self.units.is_closed()
    }
}

/// A held unit of a signal, posted back when dropped
#[derive(Debug)]
pub struct SignalToken<'a> {
    signal: &'a Signal,
}

impl Drop for SignalToken<'_> {
    fn drop(&mut self) {
        self.signal.post();
    }
}
