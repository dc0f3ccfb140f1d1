//! Centralized Configuration Management
//!
//! All tunables of the scheduler in one serde-friendly tree. Durations are
//! stored as milliseconds so the structures round-trip through TOML; a value
//! of `0` for a wait timeout means "wait forever".

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

// ----------------------------------------------------------------------------
// Signal Configuration
// ----------------------------------------------------------------------------

/// Configuration for the frame signal and the entity lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Maximum pending frames. `1` coalesces like a binary semaphore.
    pub frame_max_count: usize,
    /// How long a frame-paced task waits for vsync before reporting a missed deadline
    pub frame_wait_timeout_ms: u64,
    /// How long a task waits for the entity lock
    pub lock_timeout_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            frame_max_count: 1,
            frame_wait_timeout_ms: 500,
            lock_timeout_ms: 100,
        }
    }
}

impl SignalConfig {
    pub fn frame_wait_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.frame_wait_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.lock_timeout_ms)
    }
}

// ----------------------------------------------------------------------------
// Queue Configuration
// ----------------------------------------------------------------------------

/// Configuration for the byte queue between the GNSS source and the framer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of bytes the queue holds
    pub capacity: usize,
    /// Producer wait when the queue is full
    pub put_timeout_ms: u64,
    /// Consumer wait when the queue is empty
    pub get_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            put_timeout_ms: 100,
            get_timeout_ms: 2000,
        }
    }
}

impl QueueConfig {
    pub fn put_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.put_timeout_ms)
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.get_timeout_ms)
    }
}

// ----------------------------------------------------------------------------
// Framer Configuration
// ----------------------------------------------------------------------------

/// Configuration for the line framer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Maximum bytes in one record (excluding the delimiter)
    pub capacity: usize,
    /// Record delimiter
    pub delimiter: u8,
    /// Append the delimiter to emitted records
    pub include_delimiter: bool,
    /// Drop a trailing `\r` before emitting (CRLF streams)
    pub strip_carriage_return: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            delimiter: b'\n',
            include_delimiter: false,
            strip_carriage_return: true,
        }
    }
}

impl FramerConfig {
    /// Framer with the given capacity and default delimiter handling
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Arena Configuration
// ----------------------------------------------------------------------------

/// Geometry of the simulated screen and the canonical ball state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
    pub ball_radius: f32,
    /// Velocity the ball is reset to, pixels per second
    pub canonical_vx: f32,
    pub canonical_vy: f32,
    /// Upper bound enforced by the kick task, pixels per second
    pub max_speed: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
            ball_radius: 20.0,
            canonical_vx: 100.0,
            canonical_vy: 100.0,
            max_speed: 1000.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Timing Configuration
// ----------------------------------------------------------------------------

/// Periods of the fixed-rate tasks and the simulated vsync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Display refresh rate driving the frame signal
    pub refresh_hz: u32,
    /// Period of the heartbeat/send task
    pub heartbeat_period_ms: u64,
    /// Period of the ball kick task
    pub kick_period_ms: u64,
    /// Pause after each GNSS burst
    pub burst_interval_ms: u64,
    /// How long the line consumer waits before logging an idle stream
    pub consumer_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            heartbeat_period_ms: 1000,
            kick_period_ms: 50,
            burst_interval_ms: 1000,
            consumer_timeout_ms: 5000,
        }
    }
}

impl TimingConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.refresh_hz.max(1)))
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    pub fn kick_period(&self) -> Duration {
        Duration::from_millis(self.kick_period_ms)
    }

    pub fn burst_interval(&self) -> Duration {
        Duration::from_millis(self.burst_interval_ms)
    }

    pub fn consumer_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.consumer_timeout_ms)
    }
}

// ----------------------------------------------------------------------------
// Scheduler Configuration
// ----------------------------------------------------------------------------

/// Complete scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub signal: SignalConfig,
    pub queue: QueueConfig,
    pub framer: FramerConfig,
    pub arena: ArenaConfig,
    pub timing: TimingConfig,
    /// Upper bound on registered tasks, checked at startup
    pub max_tasks: usize,
    /// Buffer for framed lines travelling to the consumer
    pub line_channel_size: usize,
    /// Buffer for mode change requests
    pub mode_channel_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            signal: SignalConfig::default(),
            queue: QueueConfig::default(),
            framer: FramerConfig::default(),
            arena: ArenaConfig::default(),
            timing: TimingConfig::default(),
            max_tasks: 16,
            line_channel_size: 32,
            mode_channel_size: 8,
        }
    }
}

impl SchedulerConfig {
    /// Fast clocks and short timeouts for tests
    pub fn testing() -> Self {
        Self {
            signal: SignalConfig {
                frame_max_count: 1,
                frame_wait_timeout_ms: 200,
                lock_timeout_ms: 200,
            },
            queue: QueueConfig {
                capacity: 10,
                put_timeout_ms: 200,
                get_timeout_ms: 200,
            },
            timing: TimingConfig {
                refresh_hz: 200,
                heartbeat_period_ms: 20,
                kick_period_ms: 10,
                burst_interval_ms: 20,
                consumer_timeout_ms: 200,
            },
            ..Self::default()
        }
    }

    /// The demo firmware's settings: 10-byte queue, 128-byte line buffer,
    /// one-second GNSS bursts and heartbeat
    pub fn demo() -> Self {
        Self::default()
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signal.frame_max_count == 0 {
            return Err(ConfigError::invalid(
                "signal.frame_max_count",
                "must be at least 1",
            ));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::invalid("queue.capacity", "must be at least 1"));
        }
        if self.framer.capacity == 0 {
            return Err(ConfigError::invalid(
                "framer.capacity",
                "must be at least 1",
            ));
        }
        if self.timing.refresh_hz == 0 {
            return Err(ConfigError::invalid(
                "timing.refresh_hz",
                "must be at least 1",
            ));
        }
        if self.timing.heartbeat_period_ms == 0 || self.timing.kick_period_ms == 0 {
            return Err(ConfigError::invalid(
                "timing",
                "fixed-rate task periods must be non-zero",
            ));
        }
        let arena = &self.arena;
        for (field, value) in [
            ("arena.width", arena.width),
            ("arena.height", arena.height),
            ("arena.ball_radius", arena.ball_radius),
            ("arena.canonical_vx", arena.canonical_vx),
            ("arena.canonical_vy", arena.canonical_vy),
            ("arena.max_speed", arena.max_speed),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field, "must be a finite number"));
            }
        }
        if arena.ball_radius <= 0.0 {
            return Err(ConfigError::invalid(
                "arena.ball_radius",
                "must be positive",
            ));
        }
        if arena.width <= 2.0 * arena.ball_radius || arena.height <= 2.0 * arena.ball_radius {
            return Err(ConfigError::invalid(
                "arena",
                format!(
                    "{}x{} arena cannot hold a ball of radius {}",
                    arena.width, arena.height, arena.ball_radius
                ),
            ));
        }
        if arena.max_speed <= 0.0 {
            return Err(ConfigError::invalid("arena.max_speed", "must be positive"));
        }
        if self.max_tasks == 0 {
            return Err(ConfigError::invalid("max_tasks", "must be at least 1"));
        }
        if self.line_channel_size == 0 || self.mode_channel_size == 0 {
            return Err(ConfigError::invalid(
                "channels",
                "channel sizes must be at least 1",
            ));
        }
        Ok(())
    }
}
