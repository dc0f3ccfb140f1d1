//! Runtime Monitoring
//!
//! Lock-free counters updated by the tasks and a serializable snapshot for
//! status output. Counters only ever increase; a snapshot is a consistent
//! enough view for reporting, not a transactional one.

use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Counters
// ----------------------------------------------------------------------------

/// Shared counters for everything the scheduler does
#[derive(Debug, Default)]
pub struct RuntimeStats {
    frames_rendered: AtomicU64,
    simulation_steps: AtomicU64,
    deadlines_missed: AtomicU64,
    stale_frames_dropped: AtomicU64,
    queue_put_timeouts: AtomicU64,
    queue_get_timeouts: AtomicU64,
    bytes_produced: AtomicU64,
    lines_framed: AtomicU64,
    lines_consumed: AtomicU64,
    framer_overflows: AtomicU64,
    collisions: AtomicU64,
    kicks_applied: AtomicU64,
    heartbeats: AtomicU64,
    mode_transitions: AtomicU64,
    task_errors: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_frame, frames_rendered);
    counter!(record_simulation_step, simulation_steps);
    counter!(record_deadline_missed, deadlines_missed);
    counter!(record_queue_put_timeout, queue_put_timeouts);
    counter!(record_queue_get_timeout, queue_get_timeouts);
    counter!(record_line_framed, lines_framed);
    counter!(record_line_consumed, lines_consumed);
    counter!(record_framer_overflow, framer_overflows);
    counter!(record_kick, kicks_applied);
    counter!(record_heartbeat, heartbeats);
    counter!(record_mode_transition, mode_transitions);
    counter!(record_task_error, task_errors);

    pub fn record_stale_frames(&self, count: usize) {
        self.stale_frames_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_bytes_produced(&self, count: usize) {
        self.bytes_produced.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_collisions(&self, count: usize) {
        self.collisions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn deadlines_missed(&self) -> u64 {
        self.deadlines_missed.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_rendered: load(&self.frames_rendered),
            simulation_steps: load(&self.simulation_steps),
            deadlines_missed: load(&self.deadlines_missed),
            stale_frames_dropped: load(&self.stale_frames_dropped),
            queue_put_timeouts: load(&self.queue_put_timeouts),
            queue_get_timeouts: load(&self.queue_get_timeouts),
            bytes_produced: load(&self.bytes_produced),
            lines_framed: load(&self.lines_framed),
            lines_consumed: load(&self.lines_consumed),
            framer_overflows: load(&self.framer_overflows),
            collisions: load(&self.collisions),
            kicks_applied: load(&self.kicks_applied),
            heartbeats: load(&self.heartbeats),
            mode_transitions: load(&self.mode_transitions),
            task_errors: load(&self.task_errors),
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Point-in-time copy of `RuntimeStats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_rendered: u64,
    pub simulation_steps: u64,
    pub deadlines_missed: u64,
    pub stale_frames_dropped: u64,
    pub queue_put_timeouts: u64,
    pub queue_get_timeouts: u64,
    pub bytes_produced: u64,
    pub lines_framed: u64,
    pub lines_consumed: u64,
    pub framer_overflows: u64,
    pub collisions: u64,
    pub kicks_applied: u64,
    pub heartbeats: u64,
    pub mode_transitions: u64,
    pub task_errors: u64,
}

impl StatsSnapshot {
    /// Lines framed but not yet seen by the consumer
    pub fn lines_in_flight(&self) -> u64 {
        self.lines_framed.saturating_sub(self.lines_consumed)
    }
}
