//! Messages and input events exchanged with the simulation.
//!
//! Submodules:
//! - [`embedded`] – an `Embedded` action started and wants host code to run
//! - [`pointer`] – pointer events already resolved to a pet
//! - [`sound`] – a frame with a sound was entered
pub mod embedded;
pub mod pointer;
pub mod sound;
