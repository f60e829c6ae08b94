//! Input systems.
//!
//! - [`route_pet_commands`] drains the [`CommandBridge`] at the start of a
//!   tick and hands each command to its pet.
//! - [`apply_pointer_input`] runs the queued pointer events through the
//!   Idle / Dragging / Thrown state machine.

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::debug;
use std::sync::Arc;

use crate::components::actionplayer::ActionPlayer;
use crate::components::behaviorstate::{BehaviorState, ReselectReason};
use crate::components::interaction::{DragState, Interaction, PointerQueue, ThrownState};
use crate::components::pet::{Facing, PetBody, PetId, PetPack};
use crate::events::pointer::PointerEvent;
use crate::resources::commandbridge::{CommandBridge, PetCommand, PetIndex};
use crate::resources::environment::Environment;
use crate::resources::petconfig::PetConfig;
use crate::systems::physics::compute_throw_velocity;

/// Move queued commands onto the pets they address.
///
/// Commands for unknown (e.g. already unregistered) pets are dropped.
pub fn route_pet_commands(
    bridge: Res<CommandBridge>,
    index: Res<PetIndex>,
    mut pets: Query<(&mut PointerQueue, &mut BehaviorState)>,
) {
    for command in bridge.rx.try_iter() {
        let handle = command.pet();
        let Some((mut queue, mut state)) = index
            .0
            .get(&handle)
            .and_then(|&entity| pets.get_mut(entity).ok())
        else {
            debug!("Dropping command for unknown {}: {:?}", handle, command);
            continue;
        };
        match command {
            PetCommand::Pointer { event, .. } => queue.0.push(event),
            PetCommand::TriggerBehavior { behavior, .. } => {
                state.trigger = Some(Arc::from(behavior.as_str()));
            }
        }
    }
}

/// Apply queued pointer events in arrival order.
pub fn apply_pointer_input(
    config: Res<PetConfig>,
    env: Res<Environment>,
    mut pets: Query<(
        &PetId,
        &PetPack,
        &mut PointerQueue,
        &mut Interaction,
        &mut PetBody,
        &mut Facing,
        &mut BehaviorState,
        &mut ActionPlayer,
    )>,
) {
    for (id, pack, mut queue, mut interaction, mut body, mut facing, mut state, mut player) in
        pets.iter_mut()
    {
        if queue.0.is_empty() {
            continue;
        }
        let catalog = &pack.0;
        let events: Vec<PointerEvent> = queue.0.drain(..).collect();
        for event in events {
            match event {
                PointerEvent::Down { pos, time } => {
                    if !interaction.is_idle() {
                        debug!("{}: pointer-down ignored while {:?}", id.0, interaction.mode());
                        continue;
                    }
                    let draggable = player
                        .action()
                        .and_then(|a| catalog.action(a))
                        .is_none_or(|a| a.draggable);
                    if !draggable {
                        debug!("{}: current action is not draggable", id.0);
                        continue;
                    }
                    interaction.transition(Interaction::Dragging(DragState {
                        grab_offset: pos - body.position,
                        pointer: pos,
                        start_pos: body.position,
                        start_time: time,
                    }));
                    body.velocity = Vec2::ZERO;
                    if let Some(dragged) = catalog.dragged_behavior {
                        lock_behavior(dragged, &mut state, &mut player, pack);
                    }
                    debug!("{}: drag started at {:?}", id.0, body.position);
                }
                PointerEvent::Move { pos, .. } => {
                    if let Interaction::Dragging(drag) = &mut *interaction {
                        drag.pointer = pos;
                        body.position = pos - drag.grab_offset;
                    }
                }
                PointerEvent::Up { pos, time } => {
                    let Interaction::Dragging(drag) = *interaction else {
                        continue;
                    };
                    body.position = pos - drag.grab_offset;
                    let displacement = body.position - drag.start_pos;
                    let elapsed = time - drag.start_time;
                    let throw = compute_throw_velocity(displacement, elapsed, &config.thrown);

                    if throw.raw_speed > config.thrown.min_throw_velocity {
                        interaction.transition(Interaction::Thrown(ThrownState { timer: 0.0 }));
                        body.velocity = throw.velocity;
                        if let Some(f) = Facing::from_dx(throw.velocity.x) {
                            *facing = f;
                        }
                        if let Some(thrown) = catalog.thrown_behavior {
                            lock_behavior(thrown, &mut state, &mut player, pack);
                        }
                        debug!("{}: thrown at {:?}", id.0, throw.velocity);
                    } else {
                        interaction.transition(Interaction::Idle);
                        body.velocity = Vec2::ZERO;
                        body.position = env.bounds.clamp_rect(body.position, body.size);
                        state.request(ReselectReason::Interaction);
                        debug!("{}: dropped at {:?}", id.0, body.position);
                    }
                }
            }
        }
    }
}

fn lock_behavior(
    behavior: usize,
    state: &mut BehaviorState,
    player: &mut ActionPlayer,
    pack: &PetPack,
) {
    let Some(def) = pack.0.behavior(behavior) else {
        return;
    };
    state.set(behavior);
    player.start(def.action, &pack.0);
}
