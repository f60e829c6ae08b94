//! Pointer input already resolved to a pet.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Pointer event in screen coordinates.
///
/// `time` is a monotonic timestamp in seconds, used to measure how long a
/// drag took when computing the throw velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { pos: Vec2, time: f64 },
    Move { pos: Vec2, time: f64 },
    Up { pos: Vec2, time: f64 },
}
