//! Bridge between external contexts and the simulation.
//!
//! Pointer events and behavior triggers may be produced on any thread (a UI
//! thread, a chat listener). They are queued on a `crossbeam-channel` and
//! drained only at the start of a tick by
//! [`route_pet_commands`](crate::systems::input::route_pet_commands), so a
//! tick never observes a half-applied command.

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender, TrySendError, unbounded};
use rustc_hash::FxHashMap;

use crate::components::pet::PetHandle;
use crate::events::pointer::PointerEvent;

/// Commands accepted from outside the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PetCommand {
    Pointer { pet: PetHandle, event: PointerEvent },
    TriggerBehavior { pet: PetHandle, behavior: String },
}

impl PetCommand {
    pub fn pet(&self) -> PetHandle {
        match self {
            PetCommand::Pointer { pet, .. } | PetCommand::TriggerBehavior { pet, .. } => *pet,
        }
    }
}

/// Cloneable, thread-safe handle for enqueueing [`PetCommand`]s.
#[derive(Debug, Clone)]
pub struct PetCommandSender {
    tx: Sender<PetCommand>,
}

impl PetCommandSender {
    /// Queue a command. Fails only once the simulation has been dropped.
    pub fn send(&self, command: PetCommand) -> Result<(), PetCommand> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(c) | TrySendError::Disconnected(c) => c,
        })
    }

    pub fn pointer(&self, pet: PetHandle, event: PointerEvent) -> Result<(), PetCommand> {
        self.send(PetCommand::Pointer { pet, event })
    }

    pub fn trigger(&self, pet: PetHandle, behavior: impl Into<String>) -> Result<(), PetCommand> {
        self.send(PetCommand::TriggerBehavior {
            pet,
            behavior: behavior.into(),
        })
    }
}

/// Channel ends owned by the world.
#[derive(Resource)]
pub struct CommandBridge {
    pub tx: Sender<PetCommand>,
    pub rx: Receiver<PetCommand>,
}

impl Default for CommandBridge {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl CommandBridge {
    pub fn sender(&self) -> PetCommandSender {
        PetCommandSender {
            tx: self.tx.clone(),
        }
    }
}

/// Maps pet handles to their entities.
#[derive(Resource, Default, Debug)]
pub struct PetIndex(pub FxHashMap<PetHandle, Entity>);
