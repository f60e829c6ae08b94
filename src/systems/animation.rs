//! Action playback system.
//!
//! [`action_playback`] advances every pet's [`ActionPlayer`] by the tick
//! delta. Block conditions are evaluated against the pet's snapshot with the
//! pet's own random source, so `random()` in a condition stays reproducible
//! per pet.
//!
//! Side effects leave the system as messages:
//! - [`SoundTriggered`] when a frame with a sound is entered (only if sound
//!   is enabled in [`PetConfig`]; the volume is scaled by the master volume),
//! - [`EmbeddedActionInvoked`] when an `Embedded` action starts.
//!
//! A terminal result requests a new behavior, but only for idle pets. A
//! dragged or thrown pet whose lock action ran out holds its last frame until
//! the interaction ends.

use bevy_ecs::prelude::*;
use log::trace;

use crate::components::actionplayer::{ActionPlayer, PlayEvents, PlayResult};
use crate::components::behaviorstate::{BehaviorState, ReselectReason};
use crate::components::boundaryflags::BoundaryFlags;
use crate::components::interaction::Interaction;
use crate::components::pet::{Facing, PetBody, PetId, PetPack, PetRng, PetSnapshot};
use crate::condition::evaluate;
use crate::events::embedded::EmbeddedActionInvoked;
use crate::events::sound::SoundTriggered;
use crate::resources::environment::Environment;
use crate::resources::petconfig::PetConfig;
use crate::resources::worldtime::WorldTime;

/// Advance playback for all pets and publish sound/embedded messages.
pub fn action_playback(
    time: Res<WorldTime>,
    env: Res<Environment>,
    config: Res<PetConfig>,
    mut pets: Query<(
        &PetId,
        &PetPack,
        &PetBody,
        &Facing,
        &BoundaryFlags,
        &Interaction,
        &mut ActionPlayer,
        &mut BehaviorState,
        &mut PetRng,
    )>,
    mut sounds: MessageWriter<SoundTriggered>,
    mut embedded: MessageWriter<EmbeddedActionInvoked>,
) {
    for (id, pack, body, facing, flags, interaction, mut player, mut state, mut rng) in
        pets.iter_mut()
    {
        let catalog = &pack.0;
        let snapshot = PetSnapshot::capture(body, *facing, flags, interaction);
        let mut events = PlayEvents::default();
        let rng = &mut rng.0;
        let result = player.advance(
            catalog,
            time.delta,
            |p| evaluate(p, &snapshot, &env, rng),
            &mut events,
        );

        if config.sound_enabled {
            for (sound, volume) in events.sounds {
                sounds.write(SoundTriggered {
                    pet: id.0,
                    sound,
                    volume: volume * config.sound_volume,
                });
            }
        }
        for action in events.embedded {
            if let Some(def) = catalog.action(action) {
                embedded.write(EmbeddedActionInvoked {
                    pet: id.0,
                    action: def.name.clone(),
                    data: def.embedded.clone(),
                });
            }
        }

        if result == PlayResult::CompletedTerminal && interaction.is_idle() {
            if state.reselect.is_none() {
                trace!("{}: action finished", id.0);
            }
            state.request(ReselectReason::Terminal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::pet::PetHandle;
    use crate::resources::catalogstore::fixtures::*;
    use crate::resources::catalogstore::{ActionKind, PackCatalog};
    use crate::resources::environment::Margins;
    use bevy_ecs::message::Messages;
    use glam::Vec2;
    use std::sync::Arc;

    fn sit_pack() -> Arc<PackCatalog> {
        let mut chime = frame("sit", 0.1);
        chime.sound = Some(Arc::from("chime.wav"));
        chime.volume = 0.5;
        let sit = action("Sit", ActionKind::Animate, vec![chime, frame("sit2", 0.1)]);
        let mut hook = action("Hook", ActionKind::Embedded, vec![]);
        hook.blocks.clear();
        Arc::new(PackCatalog::new(
            "test",
            vec![sit, hook],
            vec![behavior("Sit", 1, 0), behavior("Hook", 1, 1)],
            0,
        ))
    }

    fn make_world(config: PetConfig) -> World {
        let mut world = World::new();
        world.insert_resource(WorldTime {
            delta: 0.05,
            ..Default::default()
        });
        world.insert_resource(Environment::new(1000.0, 500.0, Margins::default()));
        world.insert_resource(config);
        world.init_resource::<Messages<SoundTriggered>>();
        world.init_resource::<Messages<EmbeddedActionInvoked>>();
        world
    }

    fn spawn(world: &mut World, pack: Arc<PackCatalog>, action: usize) -> Entity {
        let mut player = ActionPlayer::default();
        player.start(action, &pack);
        world
            .spawn((
                PetId(PetHandle(1)),
                PetPack(pack),
                PetBody::new(Vec2::new(400.0, 386.0), Vec2::new(64.0, 64.0)),
                Facing::Left,
                BoundaryFlags::default(),
                Interaction::Idle,
                player,
                BehaviorState::default(),
                PetRng(fastrand::Rng::with_seed(1)),
            ))
            .id()
    }

    fn tick(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(action_playback);
        schedule.run(world);
    }

    #[test]
    fn test_sound_is_scaled_by_master_volume() {
        let mut world = make_world(PetConfig {
            sound_volume: 0.5,
            ..Default::default()
        });
        spawn(&mut world, sit_pack(), 0);
        tick(&mut world);
        let sounds: Vec<_> = world
            .resource_mut::<Messages<SoundTriggered>>()
            .drain()
            .collect();
        assert_eq!(sounds.len(), 1);
        assert_eq!(&*sounds[0].sound, "chime.wav");
        assert!((sounds[0].volume - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_sound_disabled_publishes_nothing() {
        let mut world = make_world(PetConfig {
            sound_enabled: false,
            ..Default::default()
        });
        spawn(&mut world, sit_pack(), 0);
        tick(&mut world);
        assert!(world
            .resource_mut::<Messages<SoundTriggered>>()
            .drain()
            .next()
            .is_none());
    }

    #[test]
    fn test_embedded_action_is_published_and_requests_reselection() {
        let mut world = make_world(PetConfig::default());
        let pet = spawn(&mut world, sit_pack(), 1);
        tick(&mut world);
        let invoked: Vec<_> = world
            .resource_mut::<Messages<EmbeddedActionInvoked>>()
            .drain()
            .collect();
        assert_eq!(invoked.len(), 1);
        assert_eq!(&*invoked[0].action, "Hook");
        let state = world.get::<BehaviorState>(pet).unwrap();
        assert_eq!(state.reselect, Some(ReselectReason::Terminal));
    }

    #[test]
    fn test_terminal_while_thrown_holds() {
        let mut world = make_world(PetConfig::default());
        let pet = spawn(&mut world, sit_pack(), 1);
        world.entity_mut(pet).insert(Interaction::Thrown(
            crate::components::interaction::ThrownState { timer: 0.0 },
        ));
        tick(&mut world);
        assert_eq!(world.get::<BehaviorState>(pet).unwrap().reselect, None);
    }
}
