//! Per-pet action playback.
//!
//! [`ActionPlayer`] walks the frames of the action a pet is executing. It
//! picks the applicable [`AnimationBlock`](crate::resources::catalogstore::AnimationBlock)
//! each tick, advances frames by elapsed time and reports a [`PlayResult`].
//! Sounds and embedded invocations met along the way are collected into
//! [`PlayEvents`] for the caller to publish.
//!
//! The player holds no condition context of its own: block conditions are
//! answered by the `holds` callback passed to [`ActionPlayer::advance`].

use std::sync::Arc;

use bevy_ecs::prelude::Component;
use glam::Vec2;
use log::warn;
use smallvec::SmallVec;

use crate::condition::CompiledPredicate;
use crate::resources::catalogstore::{ActionKind, BlockRef, Frame, PackCatalog};

/// Upper bound on frame transitions processed in one tick.
const MAX_FRAME_STEPS: usize = 1024;
/// Sequences nested deeper than this are cut off.
const MAX_SEQUENCE_DEPTH: usize = 32;

/// Outcome of one [`ActionPlayer::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayResult {
    Playing,
    /// A looping action wrapped around this tick.
    CompletedLooping,
    /// The action is over; a new behavior should be selected.
    CompletedTerminal,
}

/// Side effects produced while advancing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayEvents {
    /// Sound name and linear frame volume.
    pub sounds: SmallVec<[(Arc<str>, f32); 2]>,
    /// Indices of embedded actions entered.
    pub embedded: SmallVec<[usize; 1]>,
}

/// Playback position inside one non-sequence action.
#[derive(Debug, Clone, Default, PartialEq)]
struct LeafCursor {
    action: usize,
    block: Option<BlockRef>,
    frame: usize,
    timer: f32,
    elapsed: f32,
    entered: bool,
}

impl LeafCursor {
    fn new(action: usize) -> Self {
        Self {
            action,
            ..Default::default()
        }
    }
}

enum LeafResult {
    Playing,
    Wrapped,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum ActionCursor {
    #[default]
    Stopped,
    Single(LeafCursor),
    Sequence {
        leaves: Vec<usize>,
        position: usize,
        leaf: LeafCursor,
    },
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ActionPlayer {
    action: Option<usize>,
    cursor: ActionCursor,
    elapsed: f32,
    finished: bool,
    in_gap: bool,
}

impl ActionPlayer {
    /// Start `action` from its first frame.
    pub fn start(&mut self, action: usize, catalog: &PackCatalog) {
        self.action = Some(action);
        self.elapsed = 0.0;
        self.finished = false;
        self.in_gap = false;
        self.cursor = match catalog.action(action) {
            Some(def) if def.kind == ActionKind::Sequence => {
                let mut leaves = Vec::new();
                expand_leaves(catalog, action, 0, &mut leaves);
                match leaves.first() {
                    Some(&first) => ActionCursor::Sequence {
                        leaf: LeafCursor::new(first),
                        leaves,
                        position: 0,
                    },
                    None => {
                        warn!("Sequence '{}' has no playable children", def.name);
                        self.finished = true;
                        ActionCursor::Stopped
                    }
                }
            }
            Some(_) => ActionCursor::Single(LeafCursor::new(action)),
            None => {
                warn!("Action index {} not in pack '{}'", action, catalog.name);
                self.finished = true;
                ActionCursor::Stopped
            }
        };
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }

    /// Top-level action index.
    pub fn action(&self) -> Option<usize> {
        self.action
    }

    /// Action whose frames are on screen (a sequence child while a sequence
    /// plays).
    pub fn leaf_action(&self) -> Option<usize> {
        self.leaf().map(|l| l.action)
    }

    pub fn frame_index(&self) -> Option<usize> {
        self.leaf().filter(|l| l.block.is_some()).map(|l| l.frame)
    }

    pub fn block(&self) -> Option<BlockRef> {
        self.leaf().and_then(|l| l.block)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True while no block applies and the last frame is held.
    pub fn in_gap(&self) -> bool {
        self.in_gap
    }

    fn leaf(&self) -> Option<&LeafCursor> {
        match &self.cursor {
            ActionCursor::Stopped => None,
            ActionCursor::Single(leaf) | ActionCursor::Sequence { leaf, .. } => Some(leaf),
        }
    }

    /// Frame currently shown, if any block has been selected yet.
    pub fn current_frame<'a>(&self, catalog: &'a PackCatalog) -> Option<&'a Frame> {
        let leaf = self.leaf()?;
        catalog
            .action(leaf.action)?
            .block(leaf.block?)?
            .frames
            .get(leaf.frame)
    }

    /// Authored velocity of the current frame (px/tick, facing left), or
    /// zero when the frame does not move the pet.
    pub fn frame_velocity(&self, catalog: &PackCatalog) -> Vec2 {
        if self.in_gap || self.finished {
            return Vec2::ZERO;
        }
        let Some(leaf) = self.leaf() else {
            return Vec2::ZERO;
        };
        match catalog.action(leaf.action) {
            Some(def) if def.kind == ActionKind::Move => self
                .current_frame(catalog)
                .map_or(Vec2::ZERO, |f| f.velocity),
            _ => Vec2::ZERO,
        }
    }

    /// Advance playback by `dt` seconds.
    pub fn advance(
        &mut self,
        catalog: &PackCatalog,
        dt: f32,
        mut holds: impl FnMut(&CompiledPredicate) -> bool,
        events: &mut PlayEvents,
    ) -> PlayResult {
        let Some(top) = self.action else {
            return PlayResult::CompletedTerminal;
        };
        if self.finished {
            return PlayResult::CompletedTerminal;
        }
        let Some(top_def) = catalog.action(top) else {
            self.finished = true;
            return PlayResult::CompletedTerminal;
        };
        self.elapsed += dt;

        let mut result = PlayResult::Playing;
        match &mut self.cursor {
            ActionCursor::Stopped => {
                self.finished = true;
                return PlayResult::CompletedTerminal;
            }
            ActionCursor::Single(leaf) => {
                match step_leaf(catalog, leaf, dt, top_def.looping, &mut self.in_gap, &mut holds, events) {
                    LeafResult::Playing => {}
                    LeafResult::Wrapped => result = PlayResult::CompletedLooping,
                    LeafResult::Done => {
                        self.finished = true;
                        result = PlayResult::CompletedTerminal;
                    }
                }
            }
            ActionCursor::Sequence {
                leaves,
                position,
                leaf,
            } => {
                let mut step_dt = dt;
                // Each pass either keeps playing or moves to the next child.
                for _ in 0..=leaves.len() {
                    let looping = catalog
                        .action(leaf.action)
                        .is_some_and(|d| d.looping && d.duration.is_some());
                    match step_leaf(catalog, leaf, step_dt, looping, &mut self.in_gap, &mut holds, events) {
                        LeafResult::Playing | LeafResult::Wrapped => break,
                        LeafResult::Done => {
                            *position += 1;
                            if *position >= leaves.len() {
                                if top_def.looping {
                                    *position = 0;
                                    result = PlayResult::CompletedLooping;
                                } else {
                                    self.finished = true;
                                    result = PlayResult::CompletedTerminal;
                                    break;
                                }
                            }
                            *leaf = LeafCursor::new(leaves[*position]);
                            step_dt = 0.0;
                            if result == PlayResult::CompletedLooping {
                                // Start the next lap now, but stop there.
                                step_leaf(catalog, leaf, 0.0, false, &mut self.in_gap, &mut holds, events);
                                break;
                            }
                        }
                    }
                }
            }
        }

        if !self.finished && top_def.duration.is_some_and(|cap| self.elapsed >= cap) {
            self.finished = true;
            result = PlayResult::CompletedTerminal;
        }
        result
    }
}

/// Flatten a sequence into its non-sequence leaves.
fn expand_leaves(catalog: &PackCatalog, action: usize, depth: usize, out: &mut Vec<usize>) {
    let Some(def) = catalog.action(action) else {
        return;
    };
    if def.kind != ActionKind::Sequence {
        out.push(action);
        return;
    }
    if depth >= MAX_SEQUENCE_DEPTH {
        warn!("Sequence '{}' nested too deeply, truncated", def.name);
        return;
    }
    for &child in &def.references {
        expand_leaves(catalog, child, depth + 1, out);
    }
}

fn enter_frame(frame: &Frame, events: &mut PlayEvents) {
    if let Some(sound) = &frame.sound {
        events.sounds.push((sound.clone(), frame.volume));
    }
}

fn step_leaf(
    catalog: &PackCatalog,
    leaf: &mut LeafCursor,
    dt: f32,
    looping: bool,
    in_gap: &mut bool,
    holds: &mut impl FnMut(&CompiledPredicate) -> bool,
    events: &mut PlayEvents,
) -> LeafResult {
    let Some(def) = catalog.action(leaf.action) else {
        return LeafResult::Done;
    };

    if def.kind == ActionKind::Embedded {
        if !leaf.entered {
            leaf.entered = true;
            events.embedded.push(leaf.action);
        }
        return LeafResult::Done;
    }

    match def.select_block(&mut *holds) {
        Some(choice) => {
            *in_gap = false;
            if leaf.block != Some(choice) {
                leaf.block = Some(choice);
                leaf.frame = 0;
                leaf.timer = 0.0;
                leaf.entered = false;
            }
        }
        None => {
            if !*in_gap {
                warn!(
                    "Action '{}' has no applicable animation block; holding last frame",
                    def.name
                );
            }
            *in_gap = true;
            leaf.elapsed += dt;
            return LeafResult::Playing;
        }
    }

    let Some(block) = leaf.block.and_then(|b| def.block(b)) else {
        return LeafResult::Done;
    };
    let frames = &block.frames;
    if frames.is_empty() {
        return LeafResult::Done;
    }

    if !leaf.entered {
        leaf.entered = true;
        enter_frame(&frames[leaf.frame], events);
    }

    leaf.timer += dt;
    leaf.elapsed += dt;
    let mut result = LeafResult::Playing;
    let mut steps = 0;
    while leaf.timer >= frames[leaf.frame].duration {
        steps += 1;
        if steps > MAX_FRAME_STEPS {
            leaf.timer = 0.0;
            break;
        }
        leaf.timer -= frames[leaf.frame].duration;
        if leaf.frame + 1 < frames.len() {
            leaf.frame += 1;
        } else if looping {
            leaf.frame = 0;
            result = LeafResult::Wrapped;
        } else {
            leaf.timer = 0.0;
            return LeafResult::Done;
        }
        enter_frame(&frames[leaf.frame], events);
    }

    if def.duration.is_some_and(|cap| leaf.elapsed >= cap) {
        return LeafResult::Done;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::catalogstore::fixtures::*;
    use crate::resources::catalogstore::{ActionDefinition, BehaviorDefinition};

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn catalog(actions: Vec<ActionDefinition>) -> PackCatalog {
        let behaviors: Vec<BehaviorDefinition> = vec![behavior("Default", 1, 0)];
        PackCatalog::new("test", actions, behaviors, 0)
    }

    fn sound_frame(image: &str, duration: f32, sound: &str) -> Frame {
        Frame {
            sound: Some(Arc::from(sound)),
            volume: 0.5,
            ..frame(image, duration)
        }
    }

    fn run(player: &mut ActionPlayer, catalog: &PackCatalog, dt: f32) -> (PlayResult, PlayEvents) {
        let mut events = PlayEvents::default();
        let result = player.advance(catalog, dt, |_| true, &mut events);
        (result, events)
    }

    #[test]
    fn test_looping_stay_wraps_and_fires_sounds_on_entry() {
        let stand = action(
            "Stand",
            ActionKind::Animate,
            vec![sound_frame("a", 0.1, "s0"), sound_frame("b", 0.1, "s1")],
        );
        let catalog = catalog(vec![stand]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);

        let (result, events) = run(&mut player, &catalog, 0.05);
        assert_eq!(result, PlayResult::Playing);
        assert_eq!(events.sounds.len(), 1);
        assert_eq!(&*events.sounds[0].0, "s0");
        assert!(approx_eq(events.sounds[0].1, 0.5));
        assert_eq!(player.frame_index(), Some(0));

        let (_, events) = run(&mut player, &catalog, 0.1);
        assert_eq!(player.frame_index(), Some(1));
        assert_eq!(&*events.sounds[0].0, "s1");

        let (result, events) = run(&mut player, &catalog, 0.1);
        assert_eq!(result, PlayResult::CompletedLooping);
        assert_eq!(player.frame_index(), Some(0));
        assert_eq!(&*events.sounds[0].0, "s0");
    }

    #[test]
    fn test_sound_fires_once_while_frame_spans_ticks() {
        let sit = action(
            "Sit",
            ActionKind::Animate,
            vec![sound_frame("a", 0.3, "sit"), frame("b", 0.1)],
        );
        let catalog = catalog(vec![sit]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);

        let mut sounds = 0;
        for _ in 0..5 {
            let (_, events) = run(&mut player, &catalog, 0.05);
            sounds += events.sounds.len();
            assert_eq!(player.frame_index(), Some(0));
        }
        let (_, events) = run(&mut player, &catalog, 0.1);
        sounds += events.sounds.len();
        assert_eq!(player.frame_index(), Some(1));
        assert_eq!(sounds, 1);
    }

    #[test]
    fn test_non_looping_clamps_and_terminates() {
        let mut wave = action("Wave", ActionKind::Stay, vec![frame("a", 0.1), frame("b", 0.1)]);
        wave.looping = false;
        let catalog = catalog(vec![wave]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        assert_eq!(run(&mut player, &catalog, 0.15).0, PlayResult::Playing);
        assert_eq!(run(&mut player, &catalog, 0.1).0, PlayResult::CompletedTerminal);
        assert_eq!(player.frame_index(), Some(1));
        assert!(player.is_finished());
        let (result, events) = run(&mut player, &catalog, 0.1);
        assert_eq!(result, PlayResult::CompletedTerminal);
        assert!(events.sounds.is_empty());
    }

    #[test]
    fn test_duration_cap_ends_looping_action() {
        let mut stand = action("Stand", ActionKind::Stay, vec![frame("a", 0.1)]);
        stand.duration = Some(0.35);
        let catalog = catalog(vec![stand]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        let mut ticks = 0;
        while run(&mut player, &catalog, 0.1).0 != PlayResult::CompletedTerminal {
            ticks += 1;
            assert!(ticks < 10);
        }
        assert_eq!(ticks, 3);
    }

    #[test]
    fn test_block_change_restarts_at_first_frame() {
        let mut walk = action("Walk", ActionKind::Move, vec![frame("x", 0.1)]);
        walk.blocks = vec![
            gated_block("onFloor", 1, vec![frame("f0", 0.1), frame("f1", 0.1), frame("f2", 0.1)]),
            gated_block("isThrown", 2, vec![frame("t0", 0.1), frame("t1", 0.1)]),
        ];
        let catalog = catalog(vec![walk]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        let mut events = PlayEvents::default();
        let floor_only = |p: &CompiledPredicate| &*p.source == "onFloor";
        player.advance(&catalog, 0.25, floor_only, &mut events);
        assert_eq!(player.frame_index(), Some(2));
        player.advance(&catalog, 0.01, |_| true, &mut events);
        assert_eq!(player.block(), Some(BlockRef::Block(1)));
        assert_eq!(player.frame_index(), Some(0));
        let shown = player.current_frame(&catalog).unwrap();
        assert_eq!(shown.image.as_deref(), Some("t0"));
    }

    #[test]
    fn test_gap_holds_last_frame() {
        let mut walk = action("Walk", ActionKind::Move, vec![frame("x", 0.1)]);
        let mut moving = frame("f0", 0.1);
        moving.velocity = Vec2::new(-2.0, 0.0);
        walk.blocks = vec![gated_block("onFloor", 0, vec![moving, frame("f1", 0.1)])];
        let catalog = catalog(vec![walk]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        let mut events = PlayEvents::default();
        player.advance(&catalog, 0.15, |_| true, &mut events);
        assert_eq!(player.frame_index(), Some(1));
        let result = player.advance(&catalog, 0.5, |_| false, &mut events);
        assert_eq!(result, PlayResult::Playing);
        assert!(player.in_gap());
        assert_eq!(player.frame_index(), Some(1));
        assert_eq!(player.frame_velocity(&catalog), Vec2::ZERO);
        player.advance(&catalog, 0.0, |_| true, &mut events);
        assert!(!player.in_gap());
    }

    #[test]
    fn test_gap_before_any_block_shows_nothing() {
        let mut walk = action("Walk", ActionKind::Move, vec![frame("x", 0.1)]);
        walk.blocks = vec![gated_block("onFloor", 0, vec![frame("f0", 0.1)])];
        let catalog = catalog(vec![walk]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        let mut events = PlayEvents::default();
        player.advance(&catalog, 0.1, |_| false, &mut events);
        assert!(player.current_frame(&catalog).is_none());
        assert_eq!(player.frame_index(), None);
    }

    #[test]
    fn test_sequence_plays_children_in_order() {
        let a = action("A", ActionKind::Stay, vec![frame("a0", 0.1), frame("a1", 0.1)]);
        let b = action("B", ActionKind::Animate, vec![sound_frame("b0", 0.1, "pop")]);
        let mut seq = action("Seq", ActionKind::Sequence, Vec::new());
        seq.blocks.clear();
        seq.references = vec![0, 1];
        let catalog = catalog(vec![a, b, seq]);
        let mut player = ActionPlayer::default();
        player.start(2, &catalog);
        assert_eq!(player.leaf_action(), Some(0));

        assert_eq!(run(&mut player, &catalog, 0.1).0, PlayResult::Playing);
        assert_eq!(player.frame_index(), Some(1));
        let (result, events) = run(&mut player, &catalog, 0.1);
        assert_eq!(result, PlayResult::Playing);
        assert_eq!(player.leaf_action(), Some(1));
        assert_eq!(&*events.sounds[0].0, "pop");
        let (result, _) = run(&mut player, &catalog, 0.1);
        assert_eq!(result, PlayResult::CompletedTerminal);
    }

    #[test]
    fn test_embedded_reports_terminal_immediately() {
        let mut hook = action("OpenBrowser", ActionKind::Embedded, Vec::new());
        hook.blocks.clear();
        let catalog = catalog(vec![hook]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        let (result, events) = run(&mut player, &catalog, 0.033);
        assert_eq!(result, PlayResult::CompletedTerminal);
        assert_eq!(events.embedded.as_slice(), &[0]);
        let (_, events) = run(&mut player, &catalog, 0.033);
        assert!(events.embedded.is_empty());
    }

    #[test]
    fn test_frame_velocity_only_for_move() {
        let mut step = frame("w", 0.1);
        step.velocity = Vec2::new(-3.0, 0.0);
        let walk = action("Walk", ActionKind::Move, vec![step.clone()]);
        let stand = action("Stand", ActionKind::Stay, vec![step]);
        let catalog = catalog(vec![walk, stand]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        run(&mut player, &catalog, 0.01);
        assert_eq!(player.frame_velocity(&catalog), Vec2::new(-3.0, 0.0));
        player.start(1, &catalog);
        run(&mut player, &catalog, 0.01);
        assert_eq!(player.frame_velocity(&catalog), Vec2::ZERO);
    }

    #[test]
    fn test_frame_index_stays_valid_under_random_steps() {
        let mut walk = action("Walk", ActionKind::Move, vec![frame("x", 0.1)]);
        walk.blocks = vec![
            gated_block("onFloor", 1, vec![frame("a", 0.05), frame("b", 0.2), frame("c", 0.01)]),
            gated_block("isThrown", 2, vec![frame("t", 0.07)]),
        ];
        walk.default_block = Some(block(vec![frame("d0", 0.3), frame("d1", 0.02)]));
        let catalog = catalog(vec![walk]);
        let mut player = ActionPlayer::default();
        player.start(0, &catalog);
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..2000 {
            let pick = rng.u8(0..4);
            let dt = rng.f32() * 0.5;
            let mut events = PlayEvents::default();
            player.advance(
                &catalog,
                dt,
                |p| match pick {
                    0 => false,
                    1 => &*p.source == "onFloor",
                    _ => true,
                },
                &mut events,
            );
            let block = player.block().and_then(|b| catalog.actions[0].block(b)).unwrap();
            let index = player.frame_index().unwrap();
            assert!(index < block.frames.len());
        }
    }
}
