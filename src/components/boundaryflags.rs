//! Boundary-membership flags.
//!
//! Recomputed every tick from the pet rectangle against the
//! [`Environment`](crate::resources::environment::Environment) lines,
//! whatever the interaction mode. Conditions and action border gates read
//! them.

use bevy_ecs::prelude::Component;
use glam::Vec2;
use serde::Serialize;

use crate::resources::catalogstore::BorderType;
use crate::resources::environment::{BorderKind, Environment};

/// Slack, in pixels, when testing contact with a boundary line.
const CONTACT_EPSILON: f32 = 0.5;

#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryFlags {
    pub on_floor: bool,
    pub on_ceiling: bool,
    pub on_left_wall: bool,
    pub on_right_wall: bool,
    pub close_to_left_wall: bool,
    pub close_to_right_wall: bool,
    pub right_floor: bool,
    pub left_floor: bool,
    pub right_ceiling: bool,
    pub left_ceiling: bool,
}

impl BoundaryFlags {
    /// Compute flags for a rectangle with top-left `position` and `size`.
    pub fn compute(position: Vec2, size: Vec2, env: &Environment, close_fraction: f32) -> Self {
        let b = &env.bounds;
        let on_floor = position.y + size.y >= b.floor - CONTACT_EPSILON;
        let on_ceiling = position.y <= b.ceiling + CONTACT_EPSILON;
        let on_left_wall = position.x <= b.left_wall + CONTACT_EPSILON;
        let on_right_wall = position.x + size.x >= b.right_wall - CONTACT_EPSILON;
        let mut flags = Self {
            on_floor,
            on_ceiling,
            on_left_wall,
            on_right_wall,
            close_to_left_wall: env.close_to(position, BorderKind::LeftWall, close_fraction),
            close_to_right_wall: env.close_to(position, BorderKind::RightWall, close_fraction),
            ..Self::default()
        };
        flags.refresh_corners();
        flags
    }

    /// Derive the four corner composites from the edge flags.
    pub fn refresh_corners(&mut self) {
        self.right_floor = self.on_floor && self.on_right_wall;
        self.left_floor = self.on_floor && self.on_left_wall;
        self.right_ceiling = self.on_ceiling && self.on_right_wall;
        self.left_ceiling = self.on_ceiling && self.on_left_wall;
    }

    /// Whether the pet touches the given border line.
    pub fn is_on(&self, kind: BorderKind) -> bool {
        match kind {
            BorderKind::Floor => self.on_floor,
            BorderKind::Ceiling => self.on_ceiling,
            BorderKind::LeftWall => self.on_left_wall,
            BorderKind::RightWall => self.on_right_wall,
        }
    }

    /// Whether an action gated on `border` may play with these flags.
    pub fn satisfies(&self, border: Option<BorderType>) -> bool {
        match border {
            None => true,
            Some(BorderType::Floor) => self.on_floor,
            Some(BorderType::Ceiling) => self.on_ceiling,
            Some(BorderType::Wall) => self.on_left_wall || self.on_right_wall,
        }
    }

    /// Compact text such as `on:F/RW , close:RW`.
    pub fn summary(&self) -> String {
        let mut on = Vec::new();
        if self.on_floor {
            on.push("F");
        }
        if self.on_ceiling {
            on.push("C");
        }
        if self.on_left_wall {
            on.push("LW");
        }
        if self.on_right_wall {
            on.push("RW");
        }
        let mut close = Vec::new();
        if self.close_to_left_wall {
            close.push("LW");
        }
        if self.close_to_right_wall {
            close.push("RW");
        }
        let join = |parts: Vec<&str>| {
            if parts.is_empty() {
                "n".to_string()
            } else {
                parts.join("/")
            }
        };
        format!("on:{} , close:{}", join(on), join(close))
    }
}
