use std::sync::Arc;

use bevy_ecs::prelude::Component;
use serde::Serialize;

/// Why a pet needs a new behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReselectReason {
    /// No behavior is active yet.
    Initial,
    /// The current action reported `CompletedTerminal`.
    Terminal,
    /// The current action's border no longer matches the boundary flags.
    BorderIneligible,
    /// An interaction ended (e.g. a thrown pet landed).
    Interaction,
}

/// Behavior bookkeeping for one pet.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct BehaviorState {
    /// Index into the pack's behavior table.
    pub current: Option<usize>,
    pub reselect: Option<ReselectReason>,
    /// Behavior name requested from outside the simulation.
    pub trigger: Option<Arc<str>>,
    /// Selections made so far, for diagnostics.
    pub selections: u64,
}

impl BehaviorState {
    pub fn request(&mut self, reason: ReselectReason) {
        if self.reselect.is_none() {
            self.reselect = Some(reason);
        }
    }

    pub fn set(&mut self, behavior: usize) {
        self.current = Some(behavior);
        self.reselect = None;
        self.selections += 1;
    }
}
