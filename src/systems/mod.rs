//! Pipeline systems, in the order the manager runs them.
//!
//! Submodules overview
//! - [`petconfig`] – swap in a staged configuration at the tick boundary
//! - [`input`] – route external commands and run the drag/throw state machine
//! - [`boundary`] – recompute boundary flags from pet rectangles
//! - [`behavior`] – pick behaviors by condition, frequency and chaining
//! - [`animation`] – advance action playback, publish sounds and embedded calls
//! - [`physics`] – Move-frame motion, throws, bounces and clamping
//! - [`render`] – refresh the per-pet render descriptors
//! - [`time`] – advance the simulation clock

pub mod animation;
pub mod behavior;
pub mod boundary;
pub mod input;
pub mod petconfig;
pub mod physics;
pub mod render;
pub mod time;
