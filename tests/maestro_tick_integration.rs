//! Tick-level integration tests driving the public `AnimationManager`.

use glam::Vec2;

use petmaestro::components::actionplayer::ActionPlayer;
use petmaestro::components::interaction::InteractionMode;
use petmaestro::components::pet::{PetHandle, PetPack};
use petmaestro::maestro::AnimationManager;
use petmaestro::resources::commandbridge::PetIndex;
use petmaestro::resources::environment::Margins;
use petmaestro::resources::packdata::PackData;
use petmaestro::resources::petconfig::PetConfig;

const EPSILON: f32 = 1e-3;
const DT: f32 = 1.0 / 30.0;
const PET: f32 = 64.0;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// 1000x500 screen with 10% margins: walls at x=100/900, ceiling y=50,
/// floor y=450.
fn config() -> PetConfig {
    PetConfig {
        screen_width: 1000.0,
        screen_height: 500.0,
        margins: Margins::default(),
        pet_width: PET,
        pet_height: PET,
        ..PetConfig::default()
    }
}

const TEST_PACK: &str = r#"{
    "name": "test",
    "defaultBehavior": "Stand",
    "draggedBehavior": "Dragged",
    "thrownBehavior": "Thrown",
    "actions": [
        { "name": "Stand", "type": "Stay", "duration": 1.0,
          "animations": [ { "frames": [ { "image": "stand.png", "duration": 0.2 } ] } ] },
        { "name": "Walk", "type": "Move", "borderType": "Floor", "duration": 2.0,
          "animations": [ { "frames": [
              { "image": "walk1.png", "duration": 0.1, "velocity": [-4, 0] },
              { "image": "walk2.png", "duration": 0.1, "velocity": [-4, 0] } ] } ] },
        { "name": "Climb", "type": "Move", "borderType": "Wall",
          "animations": [ { "frames": [ { "image": "climb.png", "velocity": [0, -2] } ] } ] },
        { "name": "Sit", "type": "Animate",
          "animations": [ { "frames": [
              { "image": "sit1.png", "duration": 0.1, "sound": "sit.wav" },
              { "image": "sit2.png", "duration": 0.5 } ] } ] },
        { "name": "Dragged", "type": "Animate", "loop": true,
          "animations": [ { "frames": [ { "image": "dragged.png" } ] } ] },
        { "name": "Thrown", "type": "Animate", "loop": true,
          "animations": [ { "frames": [ { "image": "thrown.png" } ] } ] }
    ],
    "behaviors": [
        { "name": "Stand", "frequency": 10 },
        { "name": "Walk", "frequency": 10 },
        { "name": "Climb", "frequency": 10 },
        { "name": "Sit", "frequency": 5 },
        { "name": "Dragged", "frequency": 1, "condition": "isDragging", "hidden": true },
        { "name": "Thrown", "frequency": 1, "condition": "isThrown", "hidden": true }
    ]
}"#;

fn manager(seed: u64) -> AnimationManager {
    let mut m = AnimationManager::with_seed(config(), seed);
    let report = m
        .load_pack("test", &PackData::from_json(TEST_PACK).unwrap())
        .unwrap();
    assert!(report.is_clean(), "{:?}", report);
    m
}

fn on_floor_at(x: f32) -> Vec2 {
    Vec2::new(x, 450.0 - PET)
}

fn assert_inside(m: &AnimationManager, pet: PetHandle) {
    let diag = m.diagnostics(pet).unwrap();
    let b = diag.bounds;
    let p = diag.position;
    assert!(p.x >= b.left_wall - EPSILON && p.x + PET <= b.right_wall + EPSILON, "{p:?}");
    assert!(p.y >= b.ceiling - EPSILON && p.y + PET <= b.floor + EPSILON, "{p:?}");
}

fn frame_index_is_valid(m: &AnimationManager, pet: PetHandle) -> bool {
    let world = m.world();
    let entity = world.resource::<PetIndex>().0[&pet];
    let player = world.get::<ActionPlayer>(entity).unwrap();
    let pack = world.get::<PetPack>(entity).unwrap();
    match (player.leaf_action(), player.block(), player.frame_index()) {
        (Some(action), Some(block), Some(index)) => pack
            .0
            .action(action)
            .and_then(|a| a.block(block))
            .is_some_and(|b| index < b.frames.len()),
        // No block chosen yet, or an embedded action: nothing to index.
        (_, None, _) | (None, _, _) => true,
        (_, Some(_), None) => false,
    }
}

#[test]
fn test_frame_index_stays_valid_under_interaction() {
    let mut m = manager(42);
    let pets: Vec<PetHandle> = (0..4).map(|_| m.register_pet("test").unwrap()).collect();
    let mut clock = 0.0_f64;
    for tick in 0..900 {
        if tick % 150 == 75 {
            let pet = pets[(tick / 150) % pets.len()];
            let p = m.diagnostics(pet).unwrap().position + Vec2::splat(10.0);
            m.pointer_down(pet, p, clock).unwrap();
            m.pointer_move(pet, p + Vec2::new(30.0, -30.0), clock + 0.02).unwrap();
            m.pointer_up(pet, p + Vec2::new(60.0, -60.0), clock + 0.04).unwrap();
        }
        let report = m.tick(DT);
        clock += f64::from(DT);
        assert_eq!(report.frames.len(), pets.len());
        for &pet in &pets {
            assert!(frame_index_is_valid(&m, pet), "tick {tick}: {pet}");
            assert_inside(&m, pet);
        }
    }
}

#[test]
fn test_drag_to_boundary_and_release_is_clamped() {
    let mut m = manager(1);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    m.tick(DT);

    // Grab 10px into the sprite, wherever the first behavior moved it.
    let grab = m.diagnostics(pet).unwrap().position + Vec2::splat(10.0);
    m.pointer_down(pet, grab, 0.0).unwrap();
    m.tick(DT);
    let diag = m.diagnostics(pet).unwrap();
    assert_eq!(diag.mode, InteractionMode::Dragging);
    assert_eq!(diag.behavior.as_deref(), Some("Dragged"));

    // Exactly onto the left wall line, then slowly past the floor.
    m.pointer_move(pet, Vec2::new(100.0 + 10.0, 200.0), 5.0).unwrap();
    m.tick(DT);
    assert!(approx_eq(m.diagnostics(pet).unwrap().position.x, 100.0));
    m.pointer_up(pet, Vec2::new(100.0 + 10.0, 600.0), 60.0).unwrap();
    m.tick(DT);

    let diag = m.diagnostics(pet).unwrap();
    assert_eq!(diag.mode, InteractionMode::Idle);
    assert_inside(&m, pet);
    assert!(diag.flags.on_left_wall);
}

#[test]
fn test_thrown_pet_lands_within_cap() {
    let mut m = manager(2);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    m.tick(DT);

    let grab = on_floor_at(400.0) + Vec2::splat(10.0);
    m.pointer_down(pet, grab, 0.0).unwrap();
    m.pointer_up(pet, grab + Vec2::new(40.0, -60.0), 0.1).unwrap();
    m.tick(DT);
    let diag = m.diagnostics(pet).unwrap();
    assert_eq!(diag.mode, InteractionMode::Thrown);
    assert_eq!(diag.behavior.as_deref(), Some("Thrown"));
    assert!(diag.velocity.x > 0.0);

    let cap = (m.config().thrown.throw_duration / DT).ceil() as usize + 1;
    let mut landed_after = None;
    for tick in 1..=cap {
        m.tick(DT);
        assert_inside(&m, pet);
        if m.diagnostics(pet).unwrap().mode == InteractionMode::Idle {
            landed_after = Some(tick);
            break;
        }
    }
    assert!(landed_after.is_some(), "still thrown after {cap} ticks");
    // The replacement behavior is chosen on the tick after landing.
    m.tick(DT);
    let diag = m.diagnostics(pet).unwrap();
    assert_ne!(diag.behavior.as_deref(), Some("Thrown"));
}

#[test]
fn test_slow_release_drops_without_throw() {
    let mut m = manager(3);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    m.tick(DT);
    let grab = on_floor_at(400.0) + Vec2::splat(10.0);
    m.pointer_down(pet, grab, 0.0).unwrap();
    m.pointer_up(pet, grab + Vec2::new(10.0, 0.0), 2.0).unwrap();
    m.tick(DT);
    assert_eq!(m.diagnostics(pet).unwrap().mode, InteractionMode::Idle);
}

#[test]
fn test_corner_sets_composite_flags() {
    let mut m = manager(4);
    let pet = m
        .register_pet_at("test", Vec2::new(900.0 - PET, 450.0 - PET))
        .unwrap();
    let flags = m.diagnostics(pet).unwrap().flags;
    assert!(flags.on_floor && flags.on_right_wall);
    assert!(flags.right_floor);
    assert!(!flags.left_floor);
}

#[test]
fn test_trigger_from_another_thread() {
    let mut m = manager(5);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    m.tick(DT);

    let sender = m.command_sender();
    std::thread::spawn(move || sender.trigger(pet, "Sit").unwrap())
        .join()
        .unwrap();
    let report = m.tick(DT);
    let diag = m.diagnostics(pet).unwrap();
    assert_eq!(diag.behavior.as_deref(), Some("Sit"));
    assert!(report.sounds.iter().any(|s| s.pet == pet && &*s.sound == "sit.wav"));
}

#[test]
fn test_new_pet_starts_in_default_behavior() {
    let mut m = manager(5);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    let diag = m.diagnostics(pet).unwrap();
    assert_eq!(diag.behavior.as_deref(), Some("Stand"));
    assert_eq!(diag.action.as_deref(), Some("Stand"));
    m.tick(DT);
    assert_eq!(m.diagnostics(pet).unwrap().behavior.as_deref(), Some("Stand"));
}

#[test]
fn test_unknown_trigger_falls_back_to_default() {
    let mut m = manager(6);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    m.tick(DT);
    m.trigger_behavior(pet, "Dance").unwrap();
    m.tick(DT);
    assert_eq!(m.diagnostics(pet).unwrap().behavior.as_deref(), Some("Stand"));
}

#[test]
fn test_wall_action_is_dropped_away_from_walls() {
    let mut m = manager(7);
    let pet = m.register_pet_at("test", on_floor_at(400.0)).unwrap();
    m.tick(DT);
    m.trigger_behavior(pet, "Climb").unwrap();
    m.tick(DT);
    assert_eq!(m.diagnostics(pet).unwrap().action.as_deref(), Some("Climb"));
    m.tick(DT);
    let diag = m.diagnostics(pet).unwrap();
    assert!(!diag.flags.on_left_wall && !diag.flags.on_right_wall);
    assert_ne!(diag.action.as_deref(), Some("Climb"));
}

#[test]
fn test_config_change_clamps_pets_next_tick() {
    let mut m = manager(8);
    let pet = m.register_pet_at("test", on_floor_at(800.0)).unwrap();
    m.tick(DT);
    let mut smaller = m.config().clone();
    smaller.screen_width = 600.0;
    m.apply_config(smaller);
    m.tick(DT);
    let diag = m.diagnostics(pet).unwrap();
    assert!(approx_eq(diag.bounds.right_wall, 540.0));
    assert_inside(&m, pet);
}

#[test]
fn test_same_seed_same_run() {
    let run = |seed| {
        let mut m = manager(seed);
        for _ in 0..3 {
            m.register_pet("test").unwrap();
        }
        (0..300).map(|_| m.tick(DT).frames).collect::<Vec<_>>()
    };
    assert_eq!(run(99), run(99));
}

#[test]
fn test_demo_pack_loads_clean() {
    let data = PackData::from_json(include_str!("../assets/packs/demo.json")).unwrap();
    let mut m = AnimationManager::with_seed(PetConfig::default(), 10);
    let report = m.load_pack("demo", &data).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    let visible = m.visible_behaviors("demo").unwrap();
    assert!(visible.iter().all(|name| !["Fall", "Dragged", "Thrown"].contains(&&**name)));
    let pet = m.register_pet("demo").unwrap();
    for _ in 0..120 {
        m.tick(1.0 / 30.0);
    }
    assert!(m.diagnostics(pet).unwrap().behavior.is_some());
}
