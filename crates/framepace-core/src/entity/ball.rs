//! Bouncing Ball
//!
//! The single shared simulated object. Position and velocity are in pixels
//! and pixels per second inside an `Arena`. `step` integrates the position
//! and resolves wall contacts in one call, so a guard holder never observes
//! a position computed from a velocity that has not seen the latest bounce.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::guard::Resettable;
use crate::config::ArenaConfig;

// ----------------------------------------------------------------------------
// Geometry and Appearance
// ----------------------------------------------------------------------------

/// Rectangular play field with its origin in the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// 0xRRGGBB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Arena boundary a ball can hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wall {
    Left,
    Right,
    Top,
    Bottom,
}

impl fmt::Display for Wall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wall::Left => write!(f, "left"),
            Wall::Right => write!(f, "right"),
            Wall::Top => write!(f, "top"),
            Wall::Bottom => write!(f, "bottom"),
        }
    }
}

// ----------------------------------------------------------------------------
// Collision Hook
// ----------------------------------------------------------------------------

/// A wall contact reported to the collision hook
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub wall: Wall,
    pub x: f32,
    pub y: f32,
    /// Speed after the bounce
    pub speed: f32,
}

/// Capability invoked when the ball hits a wall (the demo plays a sound).
///
/// `step` only collects contacts. The owner hands them to the hook through
/// `Ball::notify_collisions` once the entity guard has been released.
pub trait CollisionHook: Send + Sync {
    fn on_collision(&self, event: &CollisionEvent);
}

// ----------------------------------------------------------------------------
// Ball
// ----------------------------------------------------------------------------

/// The bouncing ball
#[derive(Clone)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub color: Color,
    arena: Arena,
    canonical_velocity: (f32, f32),
    hook: Option<Arc<dyn CollisionHook>>,
    updates: u64,
    collisions: u64,
}

impl fmt::Debug for Ball {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ball")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("vx", &self.vx)
            .field("vy", &self.vy)
            .field("radius", &self.radius)
            .field("color", &self.color)
            .field("updates", &self.updates)
            .field("collisions", &self.collisions)
            .finish_non_exhaustive()
    }
}

impl Ball {
    /// Create a ball in its canonical state: centered, moving at `canonical_velocity`
    pub fn new(arena: Arena, radius: f32, color: Color, canonical_velocity: (f32, f32)) -> Self {
        let (x, y) = arena.center();
        Self {
            x,
            y,
            vx: canonical_velocity.0,
            vy: canonical_velocity.1,
            radius,
            color,
            arena,
            canonical_velocity,
            hook: None,
            updates: 0,
            collisions: 0,
        }
    }

    /// Ball matching an arena configuration (black, like the demo)
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self::new(
            Arena::new(config.width, config.height),
            config.ball_radius,
            Color::BLACK,
            (config.canonical_vx, config.canonical_vy),
        )
    }

    /// Register the capability invoked on every wall contact
    pub fn with_collision_hook(mut self, hook: Arc<dyn CollisionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn set_collision_hook(&mut self, hook: Option<Arc<dyn CollisionHook>>) {
        self.hook = hook;
    }

    pub fn arena(&self) -> Arena {
        self.arena
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.vx, self.vy)
    }

    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    pub fn canonical_velocity(&self) -> (f32, f32) {
        self.canonical_velocity
    }

    /// Number of position updates since creation
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Number of wall contacts since creation
    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    /// True when the whole ball lies inside the arena
    pub fn is_within_arena(&self) -> bool {
        self.x >= self.radius
            && self.x <= self.arena.width - self.radius
            && self.y >= self.radius
            && self.y <= self.arena.height - self.radius
    }

    /// Advance by `elapsed` and bounce off any wall reached. Returns the
    /// wall contacts, in the order they were resolved.
    pub fn step(&mut self, elapsed: Duration) -> Vec<CollisionEvent> {
        self.update_position(elapsed);
        self.check_collisions()
    }

    /// Integrate the position without resolving contacts
    fn update_position(&mut self, elapsed: Duration) {
        let dt = elapsed.as_secs_f32();
        self.x += self.vx * dt;
        self.y += self.vy * dt;
        self.updates += 1;
    }

    /// Clamp the ball into the arena, flipping the velocity component normal
    /// to every wall it touches. Returns the contacts.
    pub fn check_collisions(&mut self) -> Vec<CollisionEvent> {
        let r = self.radius;
        let (max_x, max_y) = (self.arena.width - r, self.arena.height - r);
        let mut hits = Vec::new();

        if self.x <= r && self.vx <= 0.0 {
            self.x = r;
            self.vx = -self.vx;
            hits.push(self.contact(Wall::Left));
        } else if self.x >= max_x && self.vx >= 0.0 {
            self.x = max_x;
            self.vx = -self.vx;
            hits.push(self.contact(Wall::Right));
        }
        self.x = self.x.clamp(r, max_x);

        if self.y <= r && self.vy <= 0.0 {
            self.y = r;
            self.vy = -self.vy;
            hits.push(self.contact(Wall::Top));
        } else if self.y >= max_y && self.vy >= 0.0 {
            self.y = max_y;
            self.vy = -self.vy;
            hits.push(self.contact(Wall::Bottom));
        }
        self.y = self.y.clamp(r, max_y);

        hits
    }

    fn contact(&mut self, wall: Wall) -> CollisionEvent {
        self.collisions += 1;
        CollisionEvent {
            wall,
            x: self.x,
            y: self.y,
            speed: self.speed(),
        }
    }

    /// Hand contacts returned by `step` to the registered hook, if any
    pub fn notify_collisions(&self, events: &[CollisionEvent]) {
        if let Some(hook) = &self.hook {
            for event in events {
                hook.on_collision(event);
            }
        }
    }

    /// Add a velocity change (pixels per second). A change that is not
    /// finite, or that would leave the velocity non-finite, is ignored and
    /// false is returned.
    pub fn apply_impulse(&mut self, dvx: f32, dvy: f32) -> bool {
        let (vx, vy) = (self.vx + dvx, self.vy + dvy);
        if !(vx.is_finite() && vy.is_finite()) {
            return false;
        }
        self.vx = vx;
        self.vy = vy;
        true
    }

    /// Scale the velocity down to `max_speed` if it is faster. Returns true
    /// when the speed was limited.
    pub fn clamp_speed(&mut self, max_speed: f32) -> bool {
        // f64 keeps the magnitude finite for any pair of finite components
        let (vx, vy) = (f64::from(self.vx), f64::from(self.vy));
        let speed = vx.hypot(vy);
        let max_speed = f64::from(max_speed);
        if speed <= max_speed || speed == 0.0 {
            return false;
        }
        let scale = max_speed / speed;
        self.vx = (vx * scale) as f32;
        self.vy = (vy * scale) as f32;
        true
    }
}

impl Resettable for Ball {
    /// Back to the center of the arena at the canonical velocity. The hook
    /// and the counters survive a reset.
    fn reset(&mut self) {
        let (x, y) = self.arena.center();
        self.x = x;
        self.y = y;
        self.vx = self.canonical_velocity.0;
        self.vy = self.canonical_velocity.1;
    }
}
