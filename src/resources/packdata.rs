//! Plain pack records and their compilation into a [`PackCatalog`].
//!
//! The external loader (XML, JSON, whatever a pack ships) fills these
//! `serde` records; [`PackData::compile`] validates them, compiles every
//! condition and resolves names to indices. Problems that only affect one
//! definition are collected in a [`LoadReport`]; the offending condition,
//! reference or definition is neutralized and loading goes on. Only a pack
//! without a usable default behavior is rejected outright.

use std::sync::Arc;

use glam::Vec2;
use log::{debug, error, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::{CompileError, CompiledPredicate, compile};
use crate::resources::catalogstore::{
    ActionDefinition, ActionKind, AnimationBlock, BehaviorDefinition, BorderType, Frame,
    PackCatalog,
};

pub const DEFAULT_FRAME_DURATION: f32 = 0.1;
pub const MIN_FRAME_DURATION: f32 = 0.001;
pub const MAX_FREQUENCY: u32 = 100;
pub const MIN_VOLUME_DB: f32 = -100.0;
pub const MAX_VOLUME_DB: f32 = 0.0;

fn default_frame_duration() -> f32 {
    DEFAULT_FRAME_DURATION
}

fn default_true() -> bool {
    true
}

fn default_frequency() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackData {
    pub name: String,
    pub default_behavior: String,
    pub dragged_behavior: Option<String>,
    pub thrown_behavior: Option<String>,
    pub actions: Vec<ActionData>,
    pub behaviors: Vec<BehaviorData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub border_type: Option<String>,
    #[serde(default, rename = "loop")]
    pub looping: Option<bool>,
    #[serde(default = "default_true")]
    pub draggable: bool,
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default)]
    pub animations: Vec<AnimationData>,
    #[serde(default)]
    pub default_animation: Option<AnimationData>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub embedded: FxHashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationData {
    pub condition: Option<String>,
    pub priority: i32,
    pub frames: Vec<FrameData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameData {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_frame_duration")]
    pub duration: f32,
    #[serde(default)]
    pub velocity: [f32; 2],
    #[serde(default)]
    pub anchor: [f32; 2],
    #[serde(default)]
    pub sound: Option<String>,
    /// Decibels, `-100..=0`.
    #[serde(default)]
    pub volume: f32,
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            image: None,
            duration: DEFAULT_FRAME_DURATION,
            velocity: [0.0, 0.0],
            anchor: [0.0, 0.0],
            sound: None,
            volume: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorData {
    pub name: String,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    /// Defaults to the action with the behavior's own name.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub next: Vec<String>,
}

/// Fatal pack problems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackError {
    #[error("pack '{pack}' has no usable behaviors")]
    NoBehaviors { pack: String },
    #[error("pack '{pack}': default behavior '{name}' is missing or was dropped")]
    MissingDefaultBehavior { pack: String, name: String },
    #[error("failed to parse pack: {0}")]
    Parse(String),
}

/// Non-fatal problems found while compiling a pack.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadIssue {
    #[error("{owner}: condition '{source_text}' does not compile ({error}); it will never match")]
    InvalidCondition {
        owner: String,
        source_text: String,
        error: CompileError,
    },
    #[error("action '{action}': unknown kind '{kind}', action dropped")]
    UnknownActionKind { action: String, kind: String },
    #[error("action '{action}': unknown border type '{border}', ignored")]
    UnknownBorderType { action: String, border: String },
    #[error("action '{action}': animation block without frames dropped")]
    EmptyBlock { action: String },
    #[error("action '{action}' has no playable frames, action dropped")]
    NoFrames { action: String },
    #[error("action '{action}': unknown sequence reference '{reference}' dropped")]
    UnknownSequenceRef { action: String, reference: String },
    #[error("action '{action}' reaches a sequence cycle, action dropped")]
    SequenceCycle { action: String },
    #[error("duplicate {what} '{name}', later definition dropped")]
    Duplicate { what: &'static str, name: String },
    #[error("behavior '{behavior}': unknown action '{action}', behavior dropped")]
    UnknownActionRef { behavior: String, action: String },
    #[error("behavior '{behavior}': unknown next behavior '{next}' dropped")]
    UnknownNextBehavior { behavior: String, next: String },
    #[error("behavior '{behavior}': frequency {value} clamped to {}", MAX_FREQUENCY)]
    FrequencyClamped { behavior: String, value: u32 },
    #[error("unknown {role} behavior '{name}', ignored")]
    UnknownInteractionBehavior { role: &'static str, name: String },
}

/// Issues collected while compiling one pack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, issue: LoadIssue) {
        warn!("Pack load: {}", issue);
        self.issues.push(issue);
    }
}

/// Convert decibels to a linear gain, clamping to `-100..=0` dB.
pub fn db_to_linear(db: f32) -> f32 {
    let db = if db.is_finite() { db } else { MAX_VOLUME_DB };
    10f32.powf(db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB) / 20.0)
}

impl PackData {
    /// Parse a JSON pack.
    pub fn from_json(text: &str) -> Result<Self, PackError> {
        serde_json::from_str(text).map_err(|e| PackError::Parse(e.to_string()))
    }

    /// Validate and compile into an immutable catalog.
    pub fn compile(&self) -> Result<(PackCatalog, LoadReport), PackError> {
        let mut report = LoadReport::default();

        // Actions: compile bodies, keep raw sequence references for later.
        let mut actions: Vec<ActionDefinition> = Vec::new();
        let mut raw_refs: Vec<Vec<String>> = Vec::new();
        let mut seen = FxHashSet::default();
        for data in &self.actions {
            if !seen.insert(data.name.as_str()) {
                report.push(LoadIssue::Duplicate {
                    what: "action",
                    name: data.name.clone(),
                });
                continue;
            }
            if let Some(action) = compile_action(data, &mut report) {
                actions.push(action);
                raw_refs.push(data.references.clone());
            }
        }

        resolve_sequences(&mut actions, &raw_refs, &mut report);

        let action_names: FxHashMap<&str, usize> = actions
            .iter()
            .enumerate()
            .map(|(i, a)| (&*a.name, i))
            .collect();

        // Behaviors: first pass keeps the ones whose action resolves.
        let mut kept: Vec<(&BehaviorData, usize)> = Vec::new();
        let mut seen = FxHashSet::default();
        for data in &self.behaviors {
            if !seen.insert(data.name.as_str()) {
                report.push(LoadIssue::Duplicate {
                    what: "behavior",
                    name: data.name.clone(),
                });
                continue;
            }
            let action_name = data.action.as_deref().unwrap_or(&data.name);
            match action_names.get(action_name) {
                Some(&index) => kept.push((data, index)),
                None => report.push(LoadIssue::UnknownActionRef {
                    behavior: data.name.clone(),
                    action: action_name.to_string(),
                }),
            }
        }

        if kept.is_empty() {
            error!("Pack '{}' rejected: no usable behaviors", self.name);
            return Err(PackError::NoBehaviors {
                pack: self.name.clone(),
            });
        }

        let behavior_names: FxHashMap<&str, usize> = kept
            .iter()
            .enumerate()
            .map(|(i, (b, _))| (b.name.as_str(), i))
            .collect();

        let behaviors: Vec<BehaviorDefinition> = kept
            .iter()
            .map(|(data, action)| compile_behavior(data, *action, &behavior_names, &mut report))
            .collect();

        let Some(&default_behavior) = behavior_names.get(self.default_behavior.as_str()) else {
            error!(
                "Pack '{}' rejected: default behavior '{}' unavailable",
                self.name, self.default_behavior
            );
            return Err(PackError::MissingDefaultBehavior {
                pack: self.name.clone(),
                name: self.default_behavior.clone(),
            });
        };

        let mut interaction = |role: &'static str, name: &Option<String>| {
            let name = name.as_deref()?;
            let found = behavior_names.get(name).copied();
            if found.is_none() {
                report.push(LoadIssue::UnknownInteractionBehavior {
                    role,
                    name: name.to_string(),
                });
            }
            found
        };
        let dragged = interaction("dragged", &self.dragged_behavior);
        let thrown = interaction("thrown", &self.thrown_behavior);

        debug!(
            "Pack '{}' compiled: {} actions, {} behaviors, {} issue(s)",
            self.name,
            actions.len(),
            behaviors.len(),
            report.len()
        );

        let catalog = PackCatalog::new(self.name.as_str(), actions, behaviors, default_behavior)
            .with_interaction_behaviors(dragged, thrown);
        Ok((catalog, report))
    }
}

fn compile_condition(
    owner: &str,
    text: Option<&str>,
    report: &mut LoadReport,
) -> Option<CompiledPredicate> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    match compile(text) {
        Ok(pred) => Some(pred),
        Err(error) => {
            report.push(LoadIssue::InvalidCondition {
                owner: owner.to_string(),
                source_text: text.to_string(),
                error,
            });
            Some(CompiledPredicate::always_false(text))
        }
    }
}

fn compile_frame(data: &FrameData) -> Frame {
    let duration = if data.duration.is_finite() {
        data.duration.max(MIN_FRAME_DURATION)
    } else {
        DEFAULT_FRAME_DURATION
    };
    Frame {
        image: data.image.as_deref().map(Arc::from),
        duration,
        velocity: Vec2::from(data.velocity),
        anchor: Vec2::from(data.anchor),
        sound: data.sound.as_deref().map(Arc::from),
        volume: db_to_linear(data.volume),
    }
}

fn compile_block(
    action: &str,
    data: &AnimationData,
    report: &mut LoadReport,
) -> Option<AnimationBlock> {
    if data.frames.is_empty() {
        report.push(LoadIssue::EmptyBlock {
            action: action.to_string(),
        });
        return None;
    }
    Some(AnimationBlock {
        condition: compile_condition(
            &format!("action '{action}'"),
            data.condition.as_deref(),
            report,
        ),
        priority: data.priority,
        frames: data.frames.iter().map(compile_frame).collect(),
    })
}

fn compile_action(data: &ActionData, report: &mut LoadReport) -> Option<ActionDefinition> {
    let Some(kind) = ActionKind::from_name(&data.kind) else {
        report.push(LoadIssue::UnknownActionKind {
            action: data.name.clone(),
            kind: data.kind.clone(),
        });
        return None;
    };

    let border = data.border_type.as_deref().and_then(|b| {
        let parsed = BorderType::from_name(b);
        if parsed.is_none() {
            report.push(LoadIssue::UnknownBorderType {
                action: data.name.clone(),
                border: b.to_string(),
            });
        }
        parsed
    });

    let blocks: Vec<AnimationBlock> = data
        .animations
        .iter()
        .filter_map(|a| compile_block(&data.name, a, report))
        .collect();
    let default_block = data
        .default_animation
        .as_ref()
        .and_then(|a| compile_block(&data.name, a, report));

    // Sequences draw their frames from children; everything else needs its own.
    let needs_frames = !matches!(kind, ActionKind::Sequence | ActionKind::Embedded);
    if needs_frames && blocks.is_empty() && default_block.is_none() {
        report.push(LoadIssue::NoFrames {
            action: data.name.clone(),
        });
        return None;
    }

    Some(ActionDefinition {
        name: Arc::from(data.name.as_str()),
        kind,
        border,
        blocks,
        default_block,
        references: Vec::new(),
        looping: data.looping.unwrap_or_else(|| kind.loops_by_default()),
        draggable: data.draggable,
        duration: data.duration.filter(|d| d.is_finite() && *d > 0.0),
        embedded: Arc::new(data.embedded.clone()),
    })
}

/// Resolve sequence references by name and drop unplayable sequences.
///
/// A sequence that reaches a cycle is dropped, and so is one left without
/// any surviving child. Indices are remapped after the drop.
fn resolve_sequences(
    actions: &mut Vec<ActionDefinition>,
    raw_refs: &[Vec<String>],
    report: &mut LoadReport,
) {
    let names: FxHashMap<&str, usize> = actions
        .iter()
        .enumerate()
        .map(|(i, a)| (&*a.name, i))
        .collect();

    let mut children: Vec<Vec<usize>> = Vec::with_capacity(actions.len());
    for (action, refs) in actions.iter().zip(raw_refs) {
        let mut resolved = Vec::new();
        if action.kind == ActionKind::Sequence {
            for r in refs {
                match names.get(r.as_str()) {
                    Some(&i) => resolved.push(i),
                    None => report.push(LoadIssue::UnknownSequenceRef {
                        action: action.name.to_string(),
                        reference: r.clone(),
                    }),
                }
            }
        }
        children.push(resolved);
    }

    // Depth-first walk; 0 = unvisited, 1 = on stack, 2 = done.
    fn reaches_cycle(i: usize, children: &[Vec<usize>], state: &mut [u8], cyclic: &mut [bool]) -> bool {
        match state[i] {
            1 => return true,
            2 => return cyclic[i],
            _ => {}
        }
        state[i] = 1;
        let mut hit = false;
        for &c in &children[i] {
            hit |= reaches_cycle(c, children, state, cyclic);
        }
        state[i] = 2;
        cyclic[i] = hit;
        hit
    }
    let mut state = vec![0u8; actions.len()];
    let mut dropped = vec![false; actions.len()];
    for i in 0..actions.len() {
        reaches_cycle(i, &children, &mut state, &mut dropped);
    }
    for (i, action) in actions.iter().enumerate() {
        if dropped[i] {
            report.push(LoadIssue::SequenceCycle {
                action: action.name.to_string(),
            });
        }
    }

    // Sequences whose children are all gone have nothing to play.
    loop {
        let mut changed = false;
        for i in 0..actions.len() {
            if dropped[i] || actions[i].kind != ActionKind::Sequence {
                continue;
            }
            if children[i].iter().all(|&c| dropped[c]) {
                dropped[i] = true;
                changed = true;
                report.push(LoadIssue::NoFrames {
                    action: actions[i].name.to_string(),
                });
            }
        }
        if !changed {
            break;
        }
    }

    let mut remap = vec![None; actions.len()];
    let mut next = 0;
    for (i, slot) in remap.iter_mut().enumerate() {
        if !dropped[i] {
            *slot = Some(next);
            next += 1;
        }
    }
    let old = std::mem::take(actions);
    for (i, mut action) in old.into_iter().enumerate() {
        if dropped[i] {
            continue;
        }
        action.references = children[i].iter().filter_map(|&c| remap[c]).collect();
        actions.push(action);
    }
}

fn compile_behavior(
    data: &BehaviorData,
    action: usize,
    behavior_names: &FxHashMap<&str, usize>,
    report: &mut LoadReport,
) -> BehaviorDefinition {
    let frequency = if data.frequency > MAX_FREQUENCY {
        report.push(LoadIssue::FrequencyClamped {
            behavior: data.name.clone(),
            value: data.frequency,
        });
        MAX_FREQUENCY
    } else {
        data.frequency
    };

    let mut next = Vec::new();
    for name in &data.next {
        match behavior_names.get(name.as_str()) {
            Some(&i) => next.push(i),
            None => report.push(LoadIssue::UnknownNextBehavior {
                behavior: data.name.clone(),
                next: name.clone(),
            }),
        }
    }

    BehaviorDefinition {
        name: Arc::from(data.name.as_str()),
        frequency,
        condition: compile_condition(
            &format!("behavior '{}'", data.name),
            data.condition.as_deref(),
            report,
        ),
        hidden: data.hidden,
        action,
        next,
    }
}
