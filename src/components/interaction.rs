//! Pointer interaction state.
//!
//! Exactly one of Idle, Dragging or Thrown holds at any time. Legal moves
//! are Idle → Dragging, Dragging → Thrown, Dragging → Idle and
//! Thrown → Idle.

use bevy_ecs::prelude::Component;
use glam::Vec2;
use serde::Serialize;
use smallvec::SmallVec;

use crate::events::pointer::PointerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InteractionMode {
    Idle,
    Dragging,
    Thrown,
}

impl InteractionMode {
    /// Whether moving from `self` to `to` is allowed.
    pub fn can_transition(self, to: InteractionMode) -> bool {
        matches!(
            (self, to),
            (InteractionMode::Idle, InteractionMode::Dragging)
                | (InteractionMode::Dragging, InteractionMode::Thrown)
                | (InteractionMode::Dragging, InteractionMode::Idle)
                | (InteractionMode::Thrown, InteractionMode::Idle)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    /// Pointer position minus pet position at pointer-down.
    pub grab_offset: Vec2,
    pub pointer: Vec2,
    pub start_pos: Vec2,
    pub start_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrownState {
    /// Seconds spent thrown.
    pub timer: f32,
}

#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging(DragState),
    Thrown(ThrownState),
}

impl Interaction {
    pub fn mode(&self) -> InteractionMode {
        match self {
            Interaction::Idle => InteractionMode::Idle,
            Interaction::Dragging(_) => InteractionMode::Dragging,
            Interaction::Thrown(_) => InteractionMode::Thrown,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, Interaction::Dragging(_))
    }

    pub fn is_thrown(&self) -> bool {
        matches!(self, Interaction::Thrown(_))
    }

    /// Replace the state if the move is legal; returns whether it happened.
    pub fn transition(&mut self, next: Interaction) -> bool {
        if self.mode().can_transition(next.mode()) {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// Pointer events routed to this pet, applied at the start of the next tick.
#[derive(Component, Debug, Clone, Default)]
pub struct PointerQueue(pub SmallVec<[PointerEvent; 4]>);
