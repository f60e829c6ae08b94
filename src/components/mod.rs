//! ECS components attached to pet entities.
//!
//! Submodules overview:
//! - [`actionplayer`] – per-pet playback cursor over the current action
//! - [`behaviorstate`] – current behavior and pending reselection requests
//! - [`boundaryflags`] – on/close flags for each boundary line
//! - [`interaction`] – Idle / Dragging / Thrown state and queued pointer events
//! - [`pet`] – identity, body, facing, random source and pack of a pet
//! - [`renderframe`] – what the host should draw this tick

pub mod actionplayer;
pub mod behaviorstate;
pub mod boundaryflags;
pub mod interaction;
pub mod pet;
pub mod renderframe;
