//! Shared simulated entities
//!
//! - `guard`: mutual-exclusion wrapper every access to a shared entity goes through
//! - `ball`: the bouncing ball mutated by the simulation tasks

pub mod ball;
pub mod guard;

pub use ball::{Arena, Ball, CollisionEvent, CollisionHook, Color, Wall};
pub use guard::{EntityGuard, Resettable};
