//! Screen boundary geometry.
//!
//! The [`Environment`] resource converts percentage margins into pixel lines
//! (floor, ceiling, left wall, right wall) and answers containment and
//! proximity queries against them. Pets are clamped to, bounced off and
//! tested against these lines.
//!
//! Recomputing the boundaries never moves pets. They are clamped against the
//! new geometry on their next tick.

use bevy_ecs::prelude::Resource;
use glam::Vec2;
use log::info;
use serde::Serialize;

/// One of the four boundary lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BorderKind {
    Floor,
    Ceiling,
    LeftWall,
    RightWall,
}

impl BorderKind {
    /// Resolve a border from the names used in condition expressions.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "floor" | "Floor" | "bottom" => Some(BorderKind::Floor),
            "ceiling" | "Ceiling" | "top" => Some(BorderKind::Ceiling),
            "leftWall" | "left_wall" | "LeftWall" | "left" => Some(BorderKind::LeftWall),
            "rightWall" | "right_wall" | "RightWall" | "right" => Some(BorderKind::RightWall),
            _ => None,
        }
    }
}

/// Boundary margins expressed as percentages (0-100) of the screen size.
///
/// Every margin is measured inward from its own screen edge: a floor margin
/// of 10 puts the floor line at 90% of the screen height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margins {
    pub floor: f32,
    pub ceiling: f32,
    pub left_wall: f32,
    pub right_wall: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            floor: 10.0,
            ceiling: 10.0,
            left_wall: 10.0,
            right_wall: 10.0,
        }
    }
}

/// Pixel lines of the play area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundaryRect {
    pub left_wall: f32,
    pub right_wall: f32,
    pub ceiling: f32,
    pub floor: f32,
}

impl BoundaryRect {
    /// Horizontal span between the walls.
    pub fn width(&self) -> f32 {
        (self.right_wall - self.left_wall).max(0.0)
    }

    /// Vertical span between ceiling and floor.
    pub fn height(&self) -> f32 {
        (self.floor - self.ceiling).max(0.0)
    }

    /// Coordinate of a boundary line (x for walls, y for floor/ceiling).
    pub fn line(&self, kind: BorderKind) -> f32 {
        match kind {
            BorderKind::Floor => self.floor,
            BorderKind::Ceiling => self.ceiling,
            BorderKind::LeftWall => self.left_wall,
            BorderKind::RightWall => self.right_wall,
        }
    }

    /// Clamp a rectangle's top-left corner so the rectangle stays inside.
    ///
    /// When the rectangle is larger than the play area the left wall and
    /// ceiling win.
    pub fn clamp_rect(&self, top_left: Vec2, size: Vec2) -> Vec2 {
        let max_x = (self.right_wall - size.x).max(self.left_wall);
        let max_y = (self.floor - size.y).max(self.ceiling);
        Vec2::new(
            top_left.x.clamp(self.left_wall, max_x),
            top_left.y.clamp(self.ceiling, max_y),
        )
    }
}

/// Screen dimensions plus the boundary lines derived from [`Margins`].
#[derive(Resource, Debug, Clone, PartialEq, Serialize)]
pub struct Environment {
    pub screen_width: f32,
    pub screen_height: f32,
    pub margins: Margins,
    pub bounds: BoundaryRect,
}

impl Environment {
    pub fn new(screen_width: f32, screen_height: f32, margins: Margins) -> Self {
        let mut env = Self {
            screen_width,
            screen_height,
            margins,
            bounds: BoundaryRect {
                left_wall: 0.0,
                right_wall: screen_width,
                ceiling: 0.0,
                floor: screen_height,
            },
        };
        env.recompute_boundaries(margins);
        env
    }

    /// Convert margins into boundary lines and store them.
    ///
    /// Margins are clamped to `0..=100`; crossing margins collapse to a
    /// zero-width span instead of inverting the walls.
    pub fn recompute_boundaries(&mut self, margins: Margins) -> BoundaryRect {
        let pct = |v: f32| v.clamp(0.0, 100.0) / 100.0;
        let left_wall = self.screen_width * pct(margins.left_wall);
        let right_wall = (self.screen_width * (1.0 - pct(margins.right_wall))).max(left_wall);
        let ceiling = self.screen_height * pct(margins.ceiling);
        let floor = (self.screen_height * (1.0 - pct(margins.floor))).max(ceiling);

        let bounds = BoundaryRect {
            left_wall,
            right_wall,
            ceiling,
            floor,
        };
        if bounds != self.bounds {
            info!("Boundaries updated: {:?} -> {:?}", self.bounds, bounds);
        }
        self.margins = margins;
        self.bounds = bounds;
        bounds
    }

    /// Change the screen size and recompute the lines with the current margins.
    pub fn resize(&mut self, screen_width: f32, screen_height: f32) -> BoundaryRect {
        self.screen_width = screen_width;
        self.screen_height = screen_height;
        self.recompute_boundaries(self.margins)
    }

    /// True when `point` lies on the playable side of (or exactly on) the line.
    pub fn is_within(&self, point: Vec2, kind: BorderKind) -> bool {
        match kind {
            BorderKind::Floor => point.y <= self.bounds.floor,
            BorderKind::Ceiling => point.y >= self.bounds.ceiling,
            BorderKind::LeftWall => point.x >= self.bounds.left_wall,
            BorderKind::RightWall => point.x <= self.bounds.right_wall,
        }
    }

    /// True when `point` is inside all four lines.
    pub fn contains(&self, point: Vec2) -> bool {
        [
            BorderKind::Floor,
            BorderKind::Ceiling,
            BorderKind::LeftWall,
            BorderKind::RightWall,
        ]
        .into_iter()
        .all(|kind| self.is_within(point, kind))
    }

    /// True when `point` is within `threshold_fraction` of the relevant span
    /// from the line, or beyond it.
    ///
    /// Walls measure against the horizontal span, floor and ceiling against
    /// the vertical span.
    pub fn close_to(&self, point: Vec2, kind: BorderKind, threshold_fraction: f32) -> bool {
        let fraction = threshold_fraction.max(0.0);
        match kind {
            BorderKind::LeftWall => {
                point.x <= self.bounds.left_wall + self.bounds.width() * fraction
            }
            BorderKind::RightWall => {
                point.x >= self.bounds.right_wall - self.bounds.width() * fraction
            }
            BorderKind::Ceiling => {
                point.y <= self.bounds.ceiling + self.bounds.height() * fraction
            }
            BorderKind::Floor => point.y >= self.bounds.floor - self.bounds.height() * fraction,
        }
    }

    /// Random top-left position for a new pet of `size`, inset by `margin`.
    ///
    /// Falls back to the play-area corner when the inset area is too small.
    pub fn safe_spawn_position(&self, size: Vec2, margin: f32, rng: &mut fastrand::Rng) -> Vec2 {
        let min_x = self.bounds.left_wall + margin;
        let max_x = self.bounds.right_wall - size.x - margin;
        let min_y = self.bounds.ceiling + margin;
        let max_y = self.bounds.floor - size.y - margin;
        let x = if max_x > min_x {
            min_x + rng.f32() * (max_x - min_x)
        } else {
            self.bounds.left_wall
        };
        let y = if max_y > min_y {
            min_y + rng.f32() * (max_y - min_y)
        } else {
            self.bounds.ceiling
        };
        Vec2::new(x, y)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(1920.0, 1080.0, Margins::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn env() -> Environment {
        Environment::new(1000.0, 500.0, Margins::default())
    }

    #[test]
    fn test_default_margins_produce_ten_percent_insets() {
        let env = env();
        assert!(approx_eq(env.bounds.left_wall, 100.0));
        assert!(approx_eq(env.bounds.right_wall, 900.0));
        assert!(approx_eq(env.bounds.ceiling, 50.0));
        assert!(approx_eq(env.bounds.floor, 450.0));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut env = env();
        let margins = Margins {
            floor: 5.0,
            ceiling: 0.0,
            left_wall: 0.0,
            right_wall: 20.0,
        };
        let first = env.recompute_boundaries(margins);
        let second = env.recompute_boundaries(margins);
        assert_eq!(first, second);
        assert!(approx_eq(first.floor, 475.0));
        assert!(approx_eq(first.right_wall, 800.0));
    }

    #[test]
    fn test_resize_keeps_margins() {
        let mut env = env();
        let bounds = env.resize(2000.0, 1000.0);
        assert_eq!(env.margins, Margins::default());
        assert!(approx_eq(bounds.right_wall, 1800.0));
        assert!(approx_eq(bounds.floor, 900.0));
        assert_eq!(env.bounds, bounds);
    }

    #[test]
    fn test_crossing_margins_collapse() {
        let mut env = env();
        let rect = env.recompute_boundaries(Margins {
            floor: 80.0,
            ceiling: 80.0,
            left_wall: 70.0,
            right_wall: 70.0,
        });
        assert!(rect.right_wall >= rect.left_wall);
        assert!(rect.floor >= rect.ceiling);
    }

    #[test]
    fn test_is_within_each_border() {
        let env = env();
        assert!(env.is_within(Vec2::new(500.0, 450.0), BorderKind::Floor));
        assert!(!env.is_within(Vec2::new(500.0, 451.0), BorderKind::Floor));
        assert!(env.is_within(Vec2::new(100.0, 200.0), BorderKind::LeftWall));
        assert!(!env.is_within(Vec2::new(99.0, 200.0), BorderKind::LeftWall));
        assert!(!env.is_within(Vec2::new(901.0, 200.0), BorderKind::RightWall));
        assert!(!env.is_within(Vec2::new(500.0, 10.0), BorderKind::Ceiling));
        assert!(env.contains(Vec2::new(500.0, 250.0)));
        assert!(!env.contains(Vec2::new(5.0, 250.0)));
    }

    #[test]
    fn test_close_to_uses_span_fraction() {
        let env = env();
        // span = 800, 20% = 160
        assert!(env.close_to(Vec2::new(260.0, 0.0), BorderKind::LeftWall, 0.2));
        assert!(!env.close_to(Vec2::new(261.0, 0.0), BorderKind::LeftWall, 0.2));
        assert!(env.close_to(Vec2::new(740.0, 0.0), BorderKind::RightWall, 0.2));
        assert!(!env.close_to(Vec2::new(739.0, 0.0), BorderKind::RightWall, 0.2));
        // beyond the wall still counts as close
        assert!(env.close_to(Vec2::new(50.0, 0.0), BorderKind::LeftWall, 0.2));
    }

    #[test]
    fn test_clamp_rect_keeps_rect_inside() {
        let env = env();
        let size = Vec2::new(64.0, 64.0);
        let clamped = env.bounds.clamp_rect(Vec2::new(950.0, 480.0), size);
        assert!(approx_eq(clamped.x, 836.0));
        assert!(approx_eq(clamped.y, 386.0));
        let clamped = env.bounds.clamp_rect(Vec2::new(-20.0, -20.0), size);
        assert!(approx_eq(clamped.x, 100.0));
        assert!(approx_eq(clamped.y, 50.0));
    }

    #[test]
    fn test_safe_spawn_inside_bounds() {
        let env = env();
        let mut rng = fastrand::Rng::with_seed(7);
        let size = Vec2::new(64.0, 64.0);
        for _ in 0..200 {
            let p = env.safe_spawn_position(size, 20.0, &mut rng);
            assert!(p.x >= 120.0 && p.x + size.x <= 880.0);
            assert!(p.y >= 70.0 && p.y + size.y <= 430.0);
        }
    }

    #[test]
    fn test_border_kind_names() {
        assert_eq!(BorderKind::from_name("floor"), Some(BorderKind::Floor));
        assert_eq!(BorderKind::from_name("leftWall"), Some(BorderKind::LeftWall));
        assert_eq!(BorderKind::from_name("nope"), None);
    }
}
