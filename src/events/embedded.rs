use std::sync::Arc;

use bevy_ecs::message::Message;
use rustc_hash::FxHashMap;

use crate::components::pet::PetHandle;

/// An `Embedded` action started playing.
///
/// Integrations hook these to run custom code (open a URL, spawn a child
/// pet, play an effect) with the action's key/value data.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct EmbeddedActionInvoked {
    pub pet: PetHandle,
    pub action: Arc<str>,
    pub data: Arc<FxHashMap<String, String>>,
}
