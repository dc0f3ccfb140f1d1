//! External Collaborators
//!
//! The scheduler only depends on these traits. Drawing, sound, button
//! polling and message transport belong to the embedding application; the
//! implementations here log through `tracing` or forward into channels.

use std::collections::VecDeque;
use std::sync::Mutex;

use framepace_core::{lock_unpoisoned, Ball, CollisionEvent, CollisionHook, FramepaceError, FramepaceResult};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace};

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// Per-frame information handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    /// Frames drawn by the calling task since startup
    pub number: u64,
    /// Most recent frames-per-second measurement
    pub fps: Option<f32>,
}

/// What a render task wants drawn
#[derive(Debug, Clone, Copy)]
pub enum Scene<'a> {
    /// Static items, sprites and the mouse ball
    Idle,
    /// Walls and the bouncing ball, copied out of its guard
    Ball(&'a Ball),
}

pub trait Renderer: Send + Sync {
    fn render(&self, frame: &FrameView, scene: Scene<'_>);
}

/// Renderer that only traces what it would draw
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn render(&self, frame: &FrameView, scene: Scene<'_>) {
        match scene {
            Scene::Idle => trace!(frame = frame.number, fps = ?frame.fps, "idle screen"),
            Scene::Ball(ball) => trace!(
                frame = frame.number,
                fps = ?frame.fps,
                x = ball.x,
                y = ball.y,
                "ball"
            ),
        }
    }
}

/// Frames-per-second over a sliding one second window
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: Duration,
    window_start: Option<Instant>,
    frames_in_window: u32,
    current: Option<f32>,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            frames_in_window: 0,
            current: None,
        }
    }

    /// Count one frame at `now`. Returns the new rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames_in_window += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.window {
            return None;
        }
        let fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
        self.current = Some(fps);
        self.window_start = Some(now);
        self.frames_in_window = 0;
        Some(fps)
    }

    pub fn current(&self) -> Option<f32> {
        self.current
    }

    /// Forget the running window, e.g. after the task was suspended
    pub fn restart(&mut self) {
        self.window_start = None;
        self.frames_in_window = 0;
    }
}

// ----------------------------------------------------------------------------
// Input
// ----------------------------------------------------------------------------

/// Button and kick input polled by the frame tasks
pub trait InputSource: Send + Sync {
    /// True once per press of the mode button
    fn take_mode_request(&self) -> bool;
    /// Velocity changes queued since the last call, pixels per second
    fn take_kicks(&self) -> Vec<(f32, f32)>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    ModeButton,
    Kick { dvx: f32, dvy: f32 },
}

#[derive(Debug, Default)]
struct PendingInput {
    mode_presses: usize,
    kicks: VecDeque<(f32, f32)>,
}

/// Input fed through an unbounded channel by the application
#[derive(Debug)]
pub struct ChannelInput {
    events: Mutex<mpsc::UnboundedReceiver<InputEvent>>,
    pending: Mutex<PendingInput>,
}

/// Producer side of a `ChannelInput`
#[derive(Debug, Clone)]
pub struct InputSender {
    sender: mpsc::UnboundedSender<InputEvent>,
}

impl InputSender {
    pub fn send(&self, event: InputEvent) -> FramepaceResult<()> {
        self.sender
            .send(event)
            .map_err(|_| FramepaceError::channel_error("Input source dropped"))
    }

    pub fn press_mode(&self) -> FramepaceResult<()> {
        self.send(InputEvent::ModeButton)
    }

    pub fn kick(&self, dvx: f32, dvy: f32) -> FramepaceResult<()> {
        self.send(InputEvent::Kick { dvx, dvy })
    }
}

impl ChannelInput {
    pub fn new() -> (Self, InputSender) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let input = Self {
            events: Mutex::new(receiver),
            pending: Mutex::new(PendingInput::default()),
        };
        (input, InputSender { sender })
    }

    fn with_pending<R>(&self, f: impl FnOnce(&mut PendingInput) -> R) -> R {
        let mut pending = lock_unpoisoned(&self.pending);
        let mut events = lock_unpoisoned(&self.events);
        while let Ok(event) = events.try_recv() {
            match event {
                InputEvent::ModeButton => pending.mode_presses += 1,
                InputEvent::Kick { dvx, dvy } => pending.kicks.push_back((dvx, dvy)),
            }
        }
        f(&mut pending)
    }
}

impl InputSource for ChannelInput {
    fn take_mode_request(&self) -> bool {
        self.with_pending(|pending| {
            if pending.mode_presses == 0 {
                return false;
            }
            pending.mode_presses -= 1;
            true
        })
    }

    fn take_kicks(&self) -> Vec<(f32, f32)> {
        self.with_pending(|pending| pending.kicks.drain(..).collect())
    }
}

// ----------------------------------------------------------------------------
// Message and Line Sinks
// ----------------------------------------------------------------------------

/// Outbound message queue or socket fed by the heartbeat task
pub trait MessageSink: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, payload: &str) -> FramepaceResult<()>;
}

/// Message sink that logs each payload
#[derive(Debug, Clone)]
pub struct TracingMessageSink {
    name: String,
}

impl TracingMessageSink {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self { name: name.into() }
    }
}

impl MessageSink for TracingMessageSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, payload: &str) -> FramepaceResult<()> {
        debug!(sink = %self.name, payload, "message sent");
        Ok(())
    }
}

/// Console-style output for framed lines and the heartbeat marker
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Line sink that logs at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLineSink;

impl LineSink for TracingLineSink {
    fn write_line(&self, line: &str) {
        info!("{}", line);
    }
}

/// Line sink forwarding every line into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelLineSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelLineSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl LineSink for ChannelLineSink {
    fn write_line(&self, line: &str) {
        // Nobody listening any more is not an error for a console
        let _ = self.sender.send(line.to_string());
    }
}

// ----------------------------------------------------------------------------
// Sound
// ----------------------------------------------------------------------------

/// Collision hook standing in for the sound sample played on a bounce
#[derive(Debug, Clone)]
pub struct TracingSoundHook {
    sample: String,
}

impl TracingSoundHook {
    pub fn new<S: Into<String>>(sample: S) -> Self {
        Self {
            sample: sample.into(),
        }
    }
}

impl Default for TracingSoundHook {
    fn default() -> Self {
        Self::new("a3")
    }
}

impl CollisionHook for TracingSoundHook {
    fn on_collision(&self, event: &CollisionEvent) {
        debug!(sample = %self.sample, wall = %event.wall, "play sound");
    }
}
