use std::sync::Arc;

use bevy_ecs::prelude::Component;
use glam::Vec2;
use serde::Serialize;

use crate::components::pet::PetHandle;

/// What the host should draw for one pet this tick.
///
/// Sprites are authored facing left; `flip_horizontal` is set when the pet
/// faces right. `image` is `None` until the first animation block applies.
#[derive(Component, Debug, Clone, PartialEq, Serialize)]
pub struct RenderDescriptor {
    pub pet: PetHandle,
    pub image: Option<Arc<str>>,
    pub anchor: Vec2,
    pub flip_horizontal: bool,
    /// Top-left corner of the pet rectangle.
    pub position: Vec2,
    pub size: Vec2,
}
