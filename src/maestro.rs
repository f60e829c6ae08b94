//! The pet orchestrator.
//!
//! [`AnimationManager`] owns a `bevy_ecs` [`World`] in which every pet is an
//! entity, plus the schedule that runs the per-tick pipeline:
//!
//! 1. [`apply_config_changes`] swaps in a staged [`PetConfig`]
//! 2. [`route_pet_commands`] drains the external command channel
//! 3. [`apply_pointer_input`] runs the drag/throw state machine
//! 4. [`update_boundary_flags`]
//! 5. [`behavior_selection`]
//! 6. [`action_playback`] (sound and embedded messages)
//! 7. [`physics_step`]
//! 8. [`update_boundary_flags`] again, for the final positions
//! 9. [`publish_render_frames`]
//!
//! Everything runs on the caller's thread. Other threads talk to the pets
//! through a [`PetCommandSender`] obtained from
//! [`AnimationManager::command_sender`]; their commands take effect at the
//! start of the next tick.

use std::sync::Arc;

use bevy_ecs::message::Messages;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use glam::Vec2;
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::components::actionplayer::ActionPlayer;
use crate::components::behaviorstate::BehaviorState;
use crate::components::boundaryflags::BoundaryFlags;
use crate::components::interaction::{Interaction, InteractionMode, PointerQueue};
use crate::components::pet::{Facing, PetBody, PetHandle, PetId, PetPack, PetRng};
use crate::components::renderframe::RenderDescriptor;
use crate::events::embedded::EmbeddedActionInvoked;
use crate::events::pointer::PointerEvent;
use crate::events::sound::SoundTriggered;
use crate::resources::catalogstore::CatalogStore;
use crate::resources::commandbridge::{CommandBridge, PetCommandSender, PetIndex};
use crate::resources::environment::{BoundaryRect, Environment};
use crate::resources::packdata::{LoadReport, PackData, PackError};
use crate::resources::petconfig::{PendingConfig, PetConfig};
use crate::resources::worldtime::WorldTime;
use crate::systems::animation::action_playback;
use crate::systems::behavior::behavior_selection;
use crate::systems::boundary::update_boundary_flags;
use crate::systems::input::{apply_pointer_input, route_pet_commands};
use crate::systems::petconfig::apply_config_changes;
use crate::systems::physics::physics_step;
use crate::systems::render::publish_render_frames;
use crate::systems::time::update_world_time;

/// Errors returned by [`AnimationManager`] entry points.
#[derive(Debug, Error)]
pub enum MaestroError {
    #[error("unknown pack '{0}'")]
    UnknownPack(String),
    #[error("unknown pet {0}")]
    UnknownPet(PetHandle),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("command channel closed")]
    Disconnected,
}

/// Everything a host needs after one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// One descriptor per pet, ordered by handle.
    pub frames: Vec<RenderDescriptor>,
    pub sounds: Vec<SoundTriggered>,
    #[serde(skip)]
    pub embedded: Vec<EmbeddedActionInvoked>,
}

/// Inspection view of one pet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PetDiagnostics {
    pub pet: PetHandle,
    pub pack: Arc<str>,
    pub behavior: Option<Arc<str>>,
    pub action: Option<Arc<str>>,
    /// Child actually playing when `action` is a sequence.
    pub playing: Option<Arc<str>>,
    pub frame_index: Option<usize>,
    pub mode: InteractionMode,
    pub facing: Facing,
    pub position: Vec2,
    pub velocity: Vec2,
    pub flags: BoundaryFlags,
    pub bounds: BoundaryRect,
    pub selections: u64,
}

pub struct AnimationManager {
    world: World,
    schedule: Schedule,
    rng: fastrand::Rng,
    next_id: u64,
    sender: PetCommandSender,
}

impl AnimationManager {
    pub fn new(config: PetConfig) -> Self {
        Self::with_rng(config, fastrand::Rng::new())
    }

    /// Fully reproducible manager: pet seeds are drawn from `seed`.
    pub fn with_seed(config: PetConfig, seed: u64) -> Self {
        Self::with_rng(config, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(config: PetConfig, rng: fastrand::Rng) -> Self {
        let mut world = World::new();
        world.insert_resource(Environment::new(
            config.screen_width,
            config.screen_height,
            config.margins,
        ));
        world.insert_resource(config);
        world.insert_resource(WorldTime::default());
        world.init_resource::<PendingConfig>();
        world.init_resource::<CatalogStore>();
        world.init_resource::<PetIndex>();
        world.init_resource::<Messages<SoundTriggered>>();
        world.init_resource::<Messages<EmbeddedActionInvoked>>();
        let bridge = CommandBridge::default();
        let sender = bridge.sender();
        world.insert_resource(bridge);

        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems(
            (
                apply_config_changes,
                route_pet_commands,
                apply_pointer_input,
                update_boundary_flags,
                behavior_selection,
                action_playback,
                physics_step,
                update_boundary_flags,
                publish_render_frames,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            rng,
            next_id: 1,
            sender,
        }
    }

    /// Compile and register a pack under `pack_id`.
    ///
    /// Non-fatal problems are returned in the [`LoadReport`]; a pack that
    /// cannot run at all is rejected with [`MaestroError::Pack`].
    pub fn load_pack(&mut self, pack_id: &str, data: &PackData) -> Result<LoadReport, MaestroError> {
        let (catalog, report) = data.compile()?;
        info!(
            "Loaded pack '{}': {} actions, {} behaviors, {} issue(s)",
            pack_id,
            catalog.actions.len(),
            catalog.behaviors.len(),
            report.len()
        );
        self.world
            .resource_mut::<CatalogStore>()
            .insert(pack_id, catalog);
        Ok(report)
    }

    /// Add a pet at a random safe position inside the boundaries.
    pub fn register_pet(&mut self, pack_id: &str) -> Result<PetHandle, MaestroError> {
        let config = self.world.resource::<PetConfig>();
        let size = config.pet_size();
        let margin = config.safe_spawn_margin;
        let position = self
            .world
            .resource::<Environment>()
            .safe_spawn_position(size, margin, &mut self.rng);
        self.register_pet_at(pack_id, position)
    }

    /// Add a pet whose top-left corner is at `position` (clamped).
    ///
    /// The pet starts in the pack's default behavior; the first tick swaps
    /// it out if its action is not eligible at the spawn position.
    pub fn register_pet_at(&mut self, pack_id: &str, position: Vec2) -> Result<PetHandle, MaestroError> {
        let catalog = self
            .world
            .resource::<CatalogStore>()
            .get(pack_id)
            .ok_or_else(|| MaestroError::UnknownPack(pack_id.to_string()))?;
        let config = self.world.resource::<PetConfig>();
        let size = config.pet_size();
        let close = config.close_threshold;
        let env = self.world.resource::<Environment>();
        let position = env.bounds.clamp_rect(position, size);
        let flags = BoundaryFlags::compute(position, size, env, close);

        let mut state = BehaviorState::default();
        let mut player = ActionPlayer::default();
        if let Some(behavior) = catalog.behavior(catalog.default_behavior) {
            state.set(catalog.default_behavior);
            player.start(behavior.action, &catalog);
        }

        let handle = PetHandle(self.next_id);
        self.next_id += 1;
        let seed = self.rng.u64(..);
        let entity = self
            .world
            .spawn((
                PetId(handle),
                PetPack(catalog),
                PetBody::new(position, size),
                Facing::default(),
                flags,
                Interaction::Idle,
                PointerQueue::default(),
                state,
                player,
                PetRng(fastrand::Rng::with_seed(seed)),
                RenderDescriptor {
                    pet: handle,
                    image: None,
                    anchor: Vec2::ZERO,
                    flip_horizontal: false,
                    position,
                    size,
                },
            ))
            .id();
        self.world.resource_mut::<PetIndex>().0.insert(handle, entity);
        info!("Registered {} with pack '{}' at {:?}", handle, pack_id, position);
        Ok(handle)
    }

    pub fn unregister_pet(&mut self, pet: PetHandle) -> Result<(), MaestroError> {
        let entity = self
            .world
            .resource_mut::<PetIndex>()
            .0
            .remove(&pet)
            .ok_or(MaestroError::UnknownPet(pet))?;
        self.world.despawn(entity);
        info!("Unregistered {}", pet);
        Ok(())
    }

    pub fn pets(&self) -> Vec<PetHandle> {
        let mut handles: Vec<PetHandle> = self.world.resource::<PetIndex>().0.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Advance the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        update_world_time(&mut self.world, dt);
        self.schedule.run(&mut self.world);

        let mut frames: Vec<RenderDescriptor> = self
            .world
            .query::<&RenderDescriptor>()
            .iter(&self.world)
            .cloned()
            .collect();
        frames.sort_by_key(|f| f.pet);
        let sounds = self
            .world
            .resource_mut::<Messages<SoundTriggered>>()
            .drain()
            .collect();
        let embedded = self
            .world
            .resource_mut::<Messages<EmbeddedActionInvoked>>()
            .drain()
            .collect();
        TickReport {
            frames,
            sounds,
            embedded,
        }
    }

    /// Handle for producing commands from other threads.
    pub fn command_sender(&self) -> PetCommandSender {
        self.sender.clone()
    }

    fn send_pointer(&self, pet: PetHandle, event: PointerEvent) -> Result<(), MaestroError> {
        self.ensure_pet(pet)?;
        self.sender
            .pointer(pet, event)
            .map_err(|_| MaestroError::Disconnected)
    }

    pub fn pointer_down(&self, pet: PetHandle, pos: Vec2, time: f64) -> Result<(), MaestroError> {
        self.send_pointer(pet, PointerEvent::Down { pos, time })
    }

    pub fn pointer_move(&self, pet: PetHandle, pos: Vec2, time: f64) -> Result<(), MaestroError> {
        self.send_pointer(pet, PointerEvent::Move { pos, time })
    }

    pub fn pointer_up(&self, pet: PetHandle, pos: Vec2, time: f64) -> Result<(), MaestroError> {
        self.send_pointer(pet, PointerEvent::Up { pos, time })
    }

    /// Ask `pet` to switch to the named behavior at the next tick.
    ///
    /// Ignored while the pet is dragged or thrown. Unknown names fall back to
    /// the pack's default behavior.
    pub fn trigger_behavior(&self, pet: PetHandle, behavior: &str) -> Result<(), MaestroError> {
        self.ensure_pet(pet)?;
        self.sender
            .trigger(pet, behavior)
            .map_err(|_| MaestroError::Disconnected)
    }

    /// Stage a new configuration; it takes effect at the next tick.
    pub fn apply_config(&mut self, config: PetConfig) {
        if self.world.resource_mut::<PendingConfig>().0.replace(config).is_some() {
            warn!("Replacing a staged configuration that was never applied");
        }
    }

    /// Read-only access to the simulation world, for hosts that want to
    /// query components directly.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &PetConfig {
        self.world.resource::<PetConfig>()
    }

    pub fn environment(&self) -> &Environment {
        self.world.resource::<Environment>()
    }

    /// Names of the behaviors a user may trigger for `pack_id`.
    pub fn visible_behaviors(&self, pack_id: &str) -> Result<Vec<Arc<str>>, MaestroError> {
        let catalog = self
            .world
            .resource::<CatalogStore>()
            .get(pack_id)
            .ok_or_else(|| MaestroError::UnknownPack(pack_id.to_string()))?;
        Ok(catalog.visible_behaviors().map(|b| b.name.clone()).collect())
    }

    pub fn diagnostics(&self, pet: PetHandle) -> Result<PetDiagnostics, MaestroError> {
        let entity = self.ensure_pet(pet)?;
        let entity = self
            .world
            .get_entity(entity)
            .map_err(|_| MaestroError::UnknownPet(pet))?;
        let (
            Some(pack),
            Some(state),
            Some(player),
            Some(interaction),
            Some(facing),
            Some(body),
            Some(flags),
        ) = (
            entity.get::<PetPack>(),
            entity.get::<BehaviorState>(),
            entity.get::<ActionPlayer>(),
            entity.get::<Interaction>(),
            entity.get::<Facing>(),
            entity.get::<PetBody>(),
            entity.get::<BoundaryFlags>(),
        )
        else {
            return Err(MaestroError::UnknownPet(pet));
        };
        let catalog = &pack.0;
        let action_name = |index: Option<usize>| {
            index
                .and_then(|a| catalog.action(a))
                .map(|a| a.name.clone())
        };
        Ok(PetDiagnostics {
            pet,
            pack: catalog.name.clone(),
            behavior: state
                .current
                .and_then(|b| catalog.behavior(b))
                .map(|b| b.name.clone()),
            action: action_name(player.action()),
            playing: action_name(player.leaf_action()),
            frame_index: player.frame_index(),
            mode: interaction.mode(),
            facing: *facing,
            position: body.position,
            velocity: body.velocity,
            flags: *flags,
            bounds: self.environment().bounds,
            selections: state.selections,
        })
    }

    fn ensure_pet(&self, pet: PetHandle) -> Result<Entity, MaestroError> {
        self.world
            .resource::<PetIndex>()
            .0
            .get(&pet)
            .copied()
            .ok_or(MaestroError::UnknownPet(pet))
    }
}
