//! Core per-pet components.
//!
//! A pet is an entity carrying [`PetId`], [`PetBody`], [`Facing`],
//! [`PetRng`] and [`PetPack`], plus the playback, behavior, interaction and
//! boundary components from the sibling modules.

use std::fmt;
use std::sync::Arc;

use bevy_ecs::prelude::Component;
use glam::Vec2;
use serde::Serialize;

use crate::components::boundaryflags::BoundaryFlags;
use crate::components::interaction::Interaction;
use crate::resources::catalogstore::PackCatalog;

/// Opaque handle returned when a pet is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PetHandle(pub u64);

impl fmt::Display for PetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pet#{}", self.0)
    }
}

/// Identity component linking an entity back to its [`PetHandle`].
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetId(pub PetHandle);

/// Facing direction. Sprites are authored facing left.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Facing {
    #[default]
    Left,
    Right,
}

impl Facing {
    /// Facing implied by a horizontal delta; `None` when there is no motion.
    pub fn from_dx(dx: f32) -> Option<Self> {
        if dx > 0.0 {
            Some(Facing::Right)
        } else if dx < 0.0 {
            Some(Facing::Left)
        } else {
            None
        }
    }

    /// Mirror a frame velocity authored for a left-facing sprite.
    pub fn orient(self, velocity: Vec2) -> Vec2 {
        match self {
            Facing::Left => velocity,
            Facing::Right => Vec2::new(-velocity.x, velocity.y),
        }
    }
}

/// Position, velocity and size of the pet rectangle.
///
/// `position` is the top-left corner in screen pixels; `velocity` is in
/// pixels per second.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct PetBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
}

impl PetBody {
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            size,
        }
    }
}

/// Per-pet random source, so one pet's draws never depend on another's.
#[derive(Component, Debug, Clone)]
pub struct PetRng(pub fastrand::Rng);

/// Shared, read-only catalog of the sprite pack this pet uses.
#[derive(Component, Clone)]
pub struct PetPack(pub Arc<PackCatalog>);

/// Read-only view of a pet used by condition evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
    pub facing: Facing,
    pub flags: BoundaryFlags,
    pub is_dragging: bool,
    pub is_thrown: bool,
}

impl PetSnapshot {
    pub fn capture(
        body: &PetBody,
        facing: Facing,
        flags: &BoundaryFlags,
        interaction: &Interaction,
    ) -> Self {
        Self {
            position: body.position,
            velocity: body.velocity,
            size: body.size,
            facing,
            flags: *flags,
            is_dragging: interaction.is_dragging(),
            is_thrown: interaction.is_thrown(),
        }
    }

    /// Snapshot of a stationary, idle pet; handy for tests and previews.
    pub fn at(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            size,
            facing: Facing::Left,
            flags: BoundaryFlags::default(),
            is_dragging: false,
            is_thrown: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_orient_mirrors_only_when_right() {
        let v = Vec2::new(-2.0, 1.0);
        assert_eq!(Facing::Left.orient(v), v);
        assert_eq!(Facing::Right.orient(v), Vec2::new(2.0, 1.0));
    }

    #[test]
    fn test_facing_from_dx() {
        assert_eq!(Facing::from_dx(3.0), Some(Facing::Right));
        assert_eq!(Facing::from_dx(-0.5), Some(Facing::Left));
        assert_eq!(Facing::from_dx(0.0), None);
    }

    #[test]
    fn test_new_body_is_at_rest() {
        let body = PetBody::new(Vec2::new(10.0, 20.0), Vec2::new(30.0, 40.0));
        assert_eq!(body.velocity, Vec2::ZERO);
        assert_eq!(body.size, Vec2::new(30.0, 40.0));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(PetHandle(7).to_string(), "pet#7");
    }
}
