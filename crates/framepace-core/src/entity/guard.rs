//! Shared Entity Guard
//!
//! Pairs one mutable entity with one binary mutual-exclusion `Signal`. The
//! entity is reachable only inside `with_entity`, so the token is held for
//! exactly the closure's duration and released on every exit path, including
//! a panic inside the closure. Guard scopes cannot span an `.await`, which
//! keeps a task from being parked while it holds the token.

use core::time::Duration;
use std::sync::Mutex;

use crate::errors::SyncError;
use crate::sync::{lock_unpoisoned, Signal};

/// Entities with a canonical state the guard can reset them to
pub trait Resettable {
    fn reset(&mut self);
}

/// Mutual-exclusion guard around a single shared entity
#[derive(Debug)]
pub struct EntityGuard<E> {
    token: Signal,
    // Only touched while `token` is held, so this lock never contends
    entity: Mutex<E>,
    lock_timeout: Option<Duration>,
}

impl<E> EntityGuard<E> {
    /// Wrap `entity`. Waits for the token give up after `lock_timeout`
    /// (`None` waits forever).
    pub fn new<N: Into<String>>(name: N, entity: E, lock_timeout: Option<Duration>) -> Self {
        Self {
            token: Signal::binary(name, true),
            entity: Mutex::new(entity),
            lock_timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.token.name()
    }

    /// True while some task holds the token
    pub fn is_held(&self) -> bool {
        self.token.available() == 0
    }

    /// Run `f` with exclusive access to the entity and return its result
    pub async fn with_entity<R, F>(&self, f: F) -> Result<R, SyncError>
    where
        F: FnOnce(&mut E) -> R,
    {
        let _token = self.token.acquire(self.lock_timeout).await?;
        let mut entity = lock_unpoisoned(&self.entity);
        Ok(f(&mut entity))
    }

    /// Copy of the entity taken under the token
    pub async fn snapshot(&self) -> Result<E, SyncError>
    where
        E: Clone,
    {
        self.with_entity(|entity| entity.clone()).await
    }
}

impl<E: Resettable> EntityGuard<E> {
    /// Put the entity back into its canonical state
    pub async fn reset(&self) -> Result<(), SyncError> {
        self.with_entity(Resettable::reset).await
    }
}
