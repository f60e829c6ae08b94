//! Boundary flag system.
//!
//! Runs twice per tick: before behavior selection, so conditions see where
//! pointer input left the pet, and after physics, so the published state
//! matches the final positions.

use bevy_ecs::prelude::*;

use crate::components::boundaryflags::BoundaryFlags;
use crate::components::pet::PetBody;
use crate::resources::environment::Environment;
use crate::resources::petconfig::PetConfig;

/// Recompute [`BoundaryFlags`] from each pet rectangle, in every mode.
pub fn update_boundary_flags(
    env: Res<Environment>,
    config: Res<PetConfig>,
    mut pets: Query<(&PetBody, &mut BoundaryFlags)>,
) {
    for (body, mut flags) in pets.iter_mut() {
        let fresh = BoundaryFlags::compute(body.position, body.size, &env, config.close_threshold);
        flags.set_if_neq(fresh);
    }
}
