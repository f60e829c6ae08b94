//! petmaestro library.
//!
//! A headless behavior and animation engine for desktop pets. Pets are
//! `bevy_ecs` entities driven each tick through input, behavior selection,
//! action playback and physics; the host receives render descriptors and
//! sound triggers and draws them however it likes.
//!
//! Start with [`maestro::AnimationManager`].

pub mod components;
pub mod condition;
pub mod events;
pub mod maestro;
pub mod resources;
pub mod systems;
