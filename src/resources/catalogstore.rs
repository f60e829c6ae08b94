//! Compiled sprite-pack catalogs.
//!
//! A [`PackCatalog`] holds the immutable action and behavior tables for one
//! sprite pack. Catalogs are built by
//! [`PackData::compile`](crate::resources::packdata::PackData::compile),
//! wrapped in an `Arc`, registered in the [`CatalogStore`] resource and
//! shared by every pet using that pack. Cross references are resolved to
//! indices at compile time, so runtime lookups never fail by name.

use std::sync::Arc;

use bevy_ecs::prelude::Resource;
use glam::Vec2;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::components::boundaryflags::BoundaryFlags;
use crate::condition::CompiledPredicate;

/// The five action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    /// Frames play in place; the pet does not move.
    Stay,
    /// Frame velocity moves the pet.
    Move,
    /// Like `Stay`, typically with sounds.
    Animate,
    /// Plays referenced actions one after another.
    Sequence,
    /// Hands off to an integration hook and completes at once.
    Embedded,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stay" => Some(ActionKind::Stay),
            "move" => Some(ActionKind::Move),
            "animate" => Some(ActionKind::Animate),
            "sequence" => Some(ActionKind::Sequence),
            "embedded" => Some(ActionKind::Embedded),
            _ => None,
        }
    }

    /// Looping default when the action does not say.
    pub fn loops_by_default(self) -> bool {
        matches!(self, ActionKind::Stay | ActionKind::Move | ActionKind::Animate)
    }
}

/// Boundary an action requires the pet to be touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BorderType {
    Floor,
    Wall,
    Ceiling,
}

impl BorderType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "floor" => Some(BorderType::Floor),
            "wall" => Some(BorderType::Wall),
            "ceiling" => Some(BorderType::Ceiling),
            _ => None,
        }
    }
}

/// One animation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub image: Option<Arc<str>>,
    /// Seconds the frame is shown.
    pub duration: f32,
    /// Pixels per tick at the configured tick rate, authored facing left.
    pub velocity: Vec2,
    pub anchor: Vec2,
    pub sound: Option<Arc<str>>,
    /// Linear gain in `[0, 1]`.
    pub volume: f32,
}

/// A list of frames gated by an optional condition.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationBlock {
    pub condition: Option<CompiledPredicate>,
    pub priority: i32,
    /// Never empty.
    pub frames: Vec<Frame>,
}

/// Which block of an action is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockRef {
    Block(usize),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    pub name: Arc<str>,
    pub kind: ActionKind,
    pub border: Option<BorderType>,
    pub blocks: Vec<AnimationBlock>,
    pub default_block: Option<AnimationBlock>,
    /// Sequence children, as indices into [`PackCatalog::actions`].
    pub references: Vec<usize>,
    pub looping: bool,
    pub draggable: bool,
    /// Optional time cap in seconds.
    pub duration: Option<f32>,
    pub embedded: Arc<FxHashMap<String, String>>,
}

impl ActionDefinition {
    pub fn block(&self, which: BlockRef) -> Option<&AnimationBlock> {
        match which {
            BlockRef::Block(i) => self.blocks.get(i),
            BlockRef::Default => self.default_block.as_ref(),
        }
    }

    /// Choose the block to play.
    ///
    /// The highest-priority block whose condition holds wins, ties going to
    /// declaration order. Blocks without a condition always hold. Returns
    /// the default block when nothing matches, and `None` when there is no
    /// default either.
    pub fn select_block(&self, mut holds: impl FnMut(&CompiledPredicate) -> bool) -> Option<BlockRef> {
        let mut best: Option<(usize, i32)> = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if best.is_some_and(|(_, p)| block.priority <= p) {
                continue;
            }
            let ok = block.condition.as_ref().is_none_or(&mut holds);
            if ok {
                best = Some((i, block.priority));
            }
        }
        match best {
            Some((i, _)) => Some(BlockRef::Block(i)),
            None if self.default_block.is_some() => Some(BlockRef::Default),
            None => None,
        }
    }

    /// Whether the action may play with the given boundary flags.
    pub fn is_eligible(&self, flags: &BoundaryFlags) -> bool {
        flags.satisfies(self.border)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorDefinition {
    pub name: Arc<str>,
    /// 0 marks a mandatory candidate; otherwise a weight up to 100.
    pub frequency: u32,
    pub condition: Option<CompiledPredicate>,
    pub hidden: bool,
    /// Index into [`PackCatalog::actions`].
    pub action: usize,
    /// Indices into [`PackCatalog::behaviors`].
    pub next: Vec<usize>,
}

impl BehaviorDefinition {
    pub fn is_mandatory(&self) -> bool {
        self.frequency == 0
    }
}

/// Immutable tables for one sprite pack.
#[derive(Debug, Clone)]
pub struct PackCatalog {
    pub name: Arc<str>,
    pub actions: Vec<ActionDefinition>,
    pub behaviors: Vec<BehaviorDefinition>,
    pub default_behavior: usize,
    pub dragged_behavior: Option<usize>,
    pub thrown_behavior: Option<usize>,
    action_index: FxHashMap<Arc<str>, usize>,
    behavior_index: FxHashMap<Arc<str>, usize>,
}

impl PackCatalog {
    pub fn new(
        name: impl Into<Arc<str>>,
        actions: Vec<ActionDefinition>,
        behaviors: Vec<BehaviorDefinition>,
        default_behavior: usize,
    ) -> Self {
        let action_index = actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();
        let behavior_index = behaviors
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        Self {
            name: name.into(),
            actions,
            behaviors,
            default_behavior,
            dragged_behavior: None,
            thrown_behavior: None,
            action_index,
            behavior_index,
        }
    }

    pub fn with_interaction_behaviors(
        mut self,
        dragged: Option<usize>,
        thrown: Option<usize>,
    ) -> Self {
        self.dragged_behavior = dragged;
        self.thrown_behavior = thrown;
        self
    }

    pub fn action(&self, index: usize) -> Option<&ActionDefinition> {
        self.actions.get(index)
    }

    pub fn behavior(&self, index: usize) -> Option<&BehaviorDefinition> {
        self.behaviors.get(index)
    }

    pub fn find_action(&self, name: &str) -> Option<usize> {
        self.action_index.get(name).copied()
    }

    pub fn find_behavior(&self, name: &str) -> Option<usize> {
        self.behavior_index.get(name).copied()
    }

    /// Action run by the behavior at `index`.
    pub fn action_of(&self, behavior: usize) -> Option<&ActionDefinition> {
        self.behavior(behavior).and_then(|b| self.action(b.action))
    }

    /// Behaviors offered to users (menus, chat triggers); hidden ones are
    /// left out.
    pub fn visible_behaviors(&self) -> impl Iterator<Item = &BehaviorDefinition> {
        self.behaviors.iter().filter(|b| !b.hidden)
    }
}

/// Registry of compiled catalogs keyed by pack id.
#[derive(Resource, Default)]
pub struct CatalogStore {
    pub packs: FxHashMap<String, Arc<PackCatalog>>,
}

impl CatalogStore {
    /// Register a catalog, replacing any previous one with the same id.
    /// Pets already using the old catalog keep their `Arc` to it.
    pub fn insert(&mut self, pack_id: impl Into<String>, catalog: PackCatalog) -> Arc<PackCatalog> {
        let catalog = Arc::new(catalog);
        self.packs.insert(pack_id.into(), catalog.clone());
        catalog
    }

    pub fn get(&self, pack_id: &str) -> Option<Arc<PackCatalog>> {
        self.packs.get(pack_id).cloned()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built catalogs for unit tests.
    use super::*;
    use crate::condition::compile;

    pub fn frame(image: &str, duration: f32) -> Frame {
        Frame {
            image: Some(Arc::from(image)),
            duration,
            velocity: Vec2::ZERO,
            anchor: Vec2::new(64.0, 128.0),
            sound: None,
            volume: 1.0,
        }
    }

    pub fn block(frames: Vec<Frame>) -> AnimationBlock {
        AnimationBlock {
            condition: None,
            priority: 0,
            frames,
        }
    }

    pub fn gated_block(condition: &str, priority: i32, frames: Vec<Frame>) -> AnimationBlock {
        AnimationBlock {
            condition: Some(compile(condition).unwrap()),
            priority,
            frames,
        }
    }

    pub fn action(name: &str, kind: ActionKind, frames: Vec<Frame>) -> ActionDefinition {
        ActionDefinition {
            name: Arc::from(name),
            kind,
            border: None,
            blocks: vec![block(frames)],
            default_block: None,
            references: Vec::new(),
            looping: kind.loops_by_default(),
            draggable: true,
            duration: None,
            embedded: Arc::default(),
        }
    }

    pub fn behavior(name: &str, frequency: u32, action: usize) -> BehaviorDefinition {
        BehaviorDefinition {
            name: Arc::from(name),
            frequency,
            condition: None,
            hidden: false,
            action,
            next: Vec::new(),
        }
    }
}
