//! Behavior selection.
//!
//! [`select_next`] picks a behavior from a pack:
//!
//! 1. keep behaviors whose condition holds and whose action's border matches
//!    the pet's boundary flags;
//! 2. if any kept behavior has frequency 0, take the first one in
//!    declaration order;
//! 3. otherwise draw among the kept behaviors weighted by frequency;
//! 4. if nothing is left, use the pack's default behavior.
//!
//! When an action ends and its behavior lists follow-ups,
//! [`select_chained`] picks uniformly among the eligible ones instead.
//!
//! [`behavior_selection`] runs selection only when a pet needs it: nothing
//! is active, the action ended, the border of the action (or of the
//! Sequence leaf it is playing) no longer matches, an
//! interaction ended, or a behavior was triggered from outside.

use bevy_ecs::prelude::*;
use log::{debug, warn};

use crate::components::actionplayer::ActionPlayer;
use crate::components::behaviorstate::{BehaviorState, ReselectReason};
use crate::components::boundaryflags::BoundaryFlags;
use crate::components::interaction::Interaction;
use crate::components::pet::{Facing, PetBody, PetId, PetPack, PetRng, PetSnapshot};
use crate::condition::evaluate;
use crate::resources::catalogstore::PackCatalog;
use crate::resources::environment::Environment;

/// Whether the behavior at `index` may be chosen for `pet` right now.
pub fn is_candidate(
    catalog: &PackCatalog,
    index: usize,
    pet: &PetSnapshot,
    env: &Environment,
    rng: &mut fastrand::Rng,
) -> bool {
    let Some(behavior) = catalog.behavior(index) else {
        return false;
    };
    let border_ok = catalog
        .action(behavior.action)
        .is_some_and(|a| a.is_eligible(&pet.flags));
    border_ok
        && behavior
            .condition
            .as_ref()
            .is_none_or(|c| evaluate(c, pet, env, rng))
}

/// Full selection over the pack's behavior table.
pub fn select_next(
    catalog: &PackCatalog,
    pet: &PetSnapshot,
    env: &Environment,
    rng: &mut fastrand::Rng,
) -> usize {
    let eligible: Vec<usize> = (0..catalog.behaviors.len())
        .filter(|&i| is_candidate(catalog, i, pet, env, rng))
        .collect();

    if let Some(&mandatory) = eligible
        .iter()
        .find(|&&i| catalog.behaviors[i].is_mandatory())
    {
        return mandatory;
    }

    let total: u32 = eligible
        .iter()
        .map(|&i| catalog.behaviors[i].frequency)
        .sum();
    if total > 0 {
        let mut roll = rng.u32(0..total);
        for &i in &eligible {
            let weight = catalog.behaviors[i].frequency;
            if roll < weight {
                return i;
            }
            roll -= weight;
        }
    }

    debug!(
        "No eligible behavior in pack '{}', falling back to default",
        catalog.name
    );
    catalog.default_behavior
}

/// Uniform pick among the eligible follow-ups of `from`.
pub fn select_chained(
    catalog: &PackCatalog,
    from: usize,
    pet: &PetSnapshot,
    env: &Environment,
    rng: &mut fastrand::Rng,
) -> Option<usize> {
    let next = &catalog.behavior(from)?.next;
    if next.is_empty() {
        return None;
    }
    let eligible: Vec<usize> = next
        .iter()
        .copied()
        .filter(|&i| is_candidate(catalog, i, pet, env, rng))
        .collect();
    if eligible.is_empty() {
        return None;
    }
    Some(eligible[rng.usize(0..eligible.len())])
}

/// Choose and start new behaviors for pets that need one.
pub fn behavior_selection(
    env: Res<Environment>,
    mut pets: Query<(
        &PetId,
        &PetPack,
        &PetBody,
        &Facing,
        &BoundaryFlags,
        &Interaction,
        &mut BehaviorState,
        &mut ActionPlayer,
        &mut PetRng,
    )>,
) {
    for (id, pack, body, facing, flags, interaction, mut state, mut player, mut rng) in
        pets.iter_mut()
    {
        let catalog = &pack.0;
        let snapshot = PetSnapshot::capture(body, *facing, flags, interaction);

        if !interaction.is_idle() {
            if let Some(name) = state.trigger.take() {
                debug!("{}: trigger '{}' ignored while {:?}", id.0, name, interaction.mode());
            }
            continue;
        }

        if let Some(name) = state.trigger.take() {
            let chosen = match catalog.find_behavior(&name) {
                Some(index) => index,
                None => {
                    warn!(
                        "{}: triggered behavior '{}' not in pack '{}'",
                        id.0, name, catalog.name
                    );
                    catalog.default_behavior
                }
            };
            start_behavior(chosen, catalog, &mut state, &mut player);
            debug!("{}: triggered '{}'", id.0, catalog.behaviors[chosen].name);
            continue;
        }

        // A Sequence's own border and that of the leaf it is playing both apply.
        let ineligible = [player.action(), player.leaf_action()]
            .into_iter()
            .flatten()
            .filter_map(|a| catalog.action(a))
            .any(|a| !a.is_eligible(flags));
        let reason = match (state.current, state.reselect) {
            (None, _) => ReselectReason::Initial,
            (_, Some(reason)) => reason,
            (Some(_), None) if ineligible => ReselectReason::BorderIneligible,
            _ => continue,
        };

        let chained = match (reason, state.current) {
            (ReselectReason::Terminal, Some(current)) => {
                select_chained(catalog, current, &snapshot, &env, &mut rng.0)
            }
            _ => None,
        };
        let chosen = chained.unwrap_or_else(|| select_next(catalog, &snapshot, &env, &mut rng.0));

        if reason == ReselectReason::BorderIneligible && state.current == Some(chosen) {
            // Nothing better; keep playing rather than restarting every tick.
            state.reselect = None;
            continue;
        }

        start_behavior(chosen, catalog, &mut state, &mut player);
        debug!(
            "{}: {:?} -> behavior '{}'",
            id.0, reason, catalog.behaviors[chosen].name
        );
    }
}

fn start_behavior(
    index: usize,
    catalog: &PackCatalog,
    state: &mut BehaviorState,
    player: &mut ActionPlayer,
) {
    let index = if catalog.behavior(index).is_some() {
        index
    } else {
        warn!("Behavior index {} not in pack '{}'", index, catalog.name);
        catalog.default_behavior
    };
    state.set(index);
    match catalog.behavior(index) {
        Some(behavior) => player.start(behavior.action, catalog),
        None => player.stop(),
    }
}
