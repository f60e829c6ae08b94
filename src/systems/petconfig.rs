//! Configuration swap system.
//!
//! Replaces the active [`PetConfig`] with the one staged in
//! [`PendingConfig`] at the start of a tick, and recomputes the
//! [`Environment`] boundaries when the screen or margins changed. Pets are
//! not moved here; physics clamps them to the new lines.

use bevy_ecs::prelude::*;
use log::info;

use crate::resources::environment::Environment;
use crate::resources::petconfig::{PendingConfig, PetConfig};

/// Apply a staged configuration, if any.
pub fn apply_config_changes(
    mut pending: ResMut<PendingConfig>,
    mut config: ResMut<PetConfig>,
    mut env: ResMut<Environment>,
) {
    let Some(next) = pending.0.take() else {
        return;
    };

    if next.screen_width != env.screen_width || next.screen_height != env.screen_height {
        env.margins = next.margins;
        env.resize(next.screen_width, next.screen_height);
    } else if next.margins != env.margins {
        env.recompute_boundaries(next.margins);
    }

    if *config != next {
        info!("PetConfig changes applied");
        *config = next;
    }
}
