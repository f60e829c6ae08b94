use std::sync::Arc;

use bevy_ecs::message::Message;
use serde::Serialize;

use crate::components::pet::PetHandle;

/// A frame with a sound was entered.
///
/// `volume` is the linear gain: the frame volume times the configured
/// master volume.
#[derive(Message, Debug, Clone, PartialEq, Serialize)]
pub struct SoundTriggered {
    pub pet: PetHandle,
    pub sound: Arc<str>,
    pub volume: f32,
}
