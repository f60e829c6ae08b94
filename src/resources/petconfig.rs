//! Simulation configuration resource.
//!
//! Screen geometry, boundary margins and physics tunables, loaded from an INI
//! file. The active [`PetConfig`] is an immutable snapshot for the duration
//! of a tick; replacements are staged in [`PendingConfig`] and swapped in by
//! [`apply_config_changes`] at the start of the next tick.
//!
//! # Configuration File Format
//!
//! ```ini
//! [screen]
//! width = 1920
//! height = 1080
//!
//! [boundaries]
//! floor_margin = 10
//! ceiling_margin = 10
//! wall_left_margin = 10
//! wall_right_margin = 10
//! close_threshold = 0.2
//! safe_spawn_margin = 50
//!
//! [physics]
//! gravity = 980
//! tick_rate = 30
//!
//! [thrown_physics]
//! max_velocity = 1500
//! min_throw_velocity = 50
//! throw_duration = 3.0
//! bounce_energy_loss = 0.7
//! gravity_multiplier = 1.5
//! time_multiplier = 1.0
//! fallback_multiplier = 30.0
//! settle_velocity = 5.0
//!
//! [sound]
//! enabled = true
//! volume = 1.0
//!
//! [pet]
//! width = 128
//! height = 128
//! ```
//!
//! [`apply_config_changes`]: crate::systems::petconfig::apply_config_changes

use std::path::PathBuf;

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use glam::Vec2;
use log::info;
use serde::Serialize;

use crate::resources::environment::Margins;

const DEFAULT_SCREEN_WIDTH: f32 = 1920.0;
const DEFAULT_SCREEN_HEIGHT: f32 = 1080.0;
const DEFAULT_MARGIN: f32 = 10.0;
const DEFAULT_CLOSE_THRESHOLD: f32 = 0.2;
const DEFAULT_SAFE_SPAWN_MARGIN: f32 = 50.0;
const DEFAULT_GRAVITY: f32 = 980.0;
const DEFAULT_TICK_RATE: f32 = 30.0;
const DEFAULT_MAX_VELOCITY: f32 = 1500.0;
const DEFAULT_MIN_THROW_VELOCITY: f32 = 50.0;
const DEFAULT_THROW_DURATION: f32 = 3.0;
const DEFAULT_BOUNCE_ENERGY_LOSS: f32 = 0.7;
const DEFAULT_THROWN_GRAVITY_MULTIPLIER: f32 = 1.5;
const DEFAULT_TIME_MULTIPLIER: f32 = 1.0;
const DEFAULT_FALLBACK_MULTIPLIER: f32 = 30.0;
const DEFAULT_SETTLE_VELOCITY: f32 = 5.0;
const DEFAULT_SOUND_ENABLED: bool = true;
const DEFAULT_SOUND_VOLUME: f32 = 1.0;
const DEFAULT_PET_SIZE: f32 = 128.0;
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

/// Tunables for the thrown state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThrownPhysics {
    /// Upper bound on the throw speed, px/s.
    pub max_velocity: f32,
    /// A release slower than this does not throw, px/s.
    pub min_throw_velocity: f32,
    /// Hard cap on time spent thrown, seconds.
    pub throw_duration: f32,
    /// Velocity factor kept after a bounce.
    pub bounce_energy_loss: f32,
    pub gravity_multiplier: f32,
    /// Scales displacement / elapsed when computing the release velocity.
    pub time_multiplier: f32,
    /// Scales displacement when the drag took no measurable time.
    pub fallback_multiplier: f32,
    /// |vy| below which a pet on the floor stops being thrown, px/s.
    pub settle_velocity: f32,
}

impl Default for ThrownPhysics {
    fn default() -> Self {
        Self {
            max_velocity: DEFAULT_MAX_VELOCITY,
            min_throw_velocity: DEFAULT_MIN_THROW_VELOCITY,
            throw_duration: DEFAULT_THROW_DURATION,
            bounce_energy_loss: DEFAULT_BOUNCE_ENERGY_LOSS,
            gravity_multiplier: DEFAULT_THROWN_GRAVITY_MULTIPLIER,
            time_multiplier: DEFAULT_TIME_MULTIPLIER,
            fallback_multiplier: DEFAULT_FALLBACK_MULTIPLIER,
            settle_velocity: DEFAULT_SETTLE_VELOCITY,
        }
    }
}

/// Simulation configuration snapshot.
#[derive(Resource, Debug, Clone, PartialEq, Serialize)]
pub struct PetConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    pub margins: Margins,
    /// Fraction of the horizontal play span that counts as "close" to a wall.
    pub close_threshold: f32,
    /// Inset, in pixels, used when picking a spawn position.
    pub safe_spawn_margin: f32,
    /// Pixels per second squared.
    pub gravity: f32,
    /// Ticks per second that frame velocities are authored for.
    pub tick_rate: f32,
    pub thrown: ThrownPhysics,
    pub sound_enabled: bool,
    /// Master gain multiplied into every sound trigger.
    pub sound_volume: f32,
    pub pet_width: f32,
    pub pet_height: f32,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for PetConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PetConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            margins: Margins {
                floor: DEFAULT_MARGIN,
                ceiling: DEFAULT_MARGIN,
                left_wall: DEFAULT_MARGIN,
                right_wall: DEFAULT_MARGIN,
            },
            close_threshold: DEFAULT_CLOSE_THRESHOLD,
            safe_spawn_margin: DEFAULT_SAFE_SPAWN_MARGIN,
            gravity: DEFAULT_GRAVITY,
            tick_rate: DEFAULT_TICK_RATE,
            thrown: ThrownPhysics::default(),
            sound_enabled: DEFAULT_SOUND_ENABLED,
            sound_volume: DEFAULT_SOUND_VOLUME,
            pet_width: DEFAULT_PET_SIZE,
            pet_height: DEFAULT_PET_SIZE,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a configuration that loads from and saves to `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    pub fn pet_size(&self) -> Vec2 {
        Vec2::new(self.pet_width, self.pet_height)
    }

    /// Load values from the INI file. Missing keys keep their current value.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply_ini(&config);
        info!("Loaded config from {:?}: {}", self.config_path, self.summary());
        Ok(())
    }

    /// Load values from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        self.apply_ini(&config);
        Ok(())
    }

    fn apply_ini(&mut self, config: &Ini) {
        let float = |section: &str, key: &str| {
            config
                .getfloat(section, key)
                .ok()
                .flatten()
                .map(|v| v as f32)
                .filter(|v| v.is_finite())
        };

        // [screen] section
        if let Some(v) = float("screen", "width").filter(|v| *v > 0.0) {
            self.screen_width = v;
        }
        if let Some(v) = float("screen", "height").filter(|v| *v > 0.0) {
            self.screen_height = v;
        }

        // [boundaries] section
        if let Some(v) = float("boundaries", "floor_margin") {
            self.margins.floor = v.clamp(0.0, 100.0);
        }
        if let Some(v) = float("boundaries", "ceiling_margin") {
            self.margins.ceiling = v.clamp(0.0, 100.0);
        }
        if let Some(v) = float("boundaries", "wall_left_margin") {
            self.margins.left_wall = v.clamp(0.0, 100.0);
        }
        if let Some(v) = float("boundaries", "wall_right_margin") {
            self.margins.right_wall = v.clamp(0.0, 100.0);
        }
        if let Some(v) = float("boundaries", "close_threshold") {
            self.close_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = float("boundaries", "safe_spawn_margin") {
            self.safe_spawn_margin = v.max(0.0);
        }

        // [physics] section
        if let Some(v) = float("physics", "gravity") {
            self.gravity = v;
        }
        if let Some(v) = float("physics", "tick_rate").filter(|v| *v > 0.0) {
            self.tick_rate = v;
        }

        // [thrown_physics] section
        let t = &mut self.thrown;
        if let Some(v) = float("thrown_physics", "max_velocity") {
            t.max_velocity = v.max(0.0);
        }
        if let Some(v) = float("thrown_physics", "min_throw_velocity") {
            t.min_throw_velocity = v.max(0.0);
        }
        if let Some(v) = float("thrown_physics", "throw_duration") {
            t.throw_duration = v.max(0.0);
        }
        if let Some(v) = float("thrown_physics", "bounce_energy_loss") {
            t.bounce_energy_loss = v.clamp(0.0, 1.0);
        }
        if let Some(v) = float("thrown_physics", "gravity_multiplier") {
            t.gravity_multiplier = v;
        }
        if let Some(v) = float("thrown_physics", "time_multiplier") {
            t.time_multiplier = v;
        }
        if let Some(v) = float("thrown_physics", "fallback_multiplier") {
            t.fallback_multiplier = v;
        }
        if let Some(v) = float("thrown_physics", "settle_velocity") {
            t.settle_velocity = v.max(0.0);
        }

        // [sound] section
        if let Some(v) = config.getbool("sound", "enabled").ok().flatten() {
            self.sound_enabled = v;
        }
        if let Some(v) = float("sound", "volume") {
            self.sound_volume = v.clamp(0.0, 1.0);
        }

        // [pet] section
        if let Some(v) = float("pet", "width").filter(|v| *v > 0.0) {
            self.pet_width = v;
        }
        if let Some(v) = float("pet", "height").filter(|v| *v > 0.0) {
            self.pet_height = v;
        }
    }

    fn to_ini(&self) -> Ini {
        let mut config = Ini::new();
        let mut set = |section: &str, key: &str, value: String| {
            config.set(section, key, Some(value));
        };

        set("screen", "width", self.screen_width.to_string());
        set("screen", "height", self.screen_height.to_string());

        set("boundaries", "floor_margin", self.margins.floor.to_string());
        set("boundaries", "ceiling_margin", self.margins.ceiling.to_string());
        set("boundaries", "wall_left_margin", self.margins.left_wall.to_string());
        set("boundaries", "wall_right_margin", self.margins.right_wall.to_string());
        set("boundaries", "close_threshold", self.close_threshold.to_string());
        set("boundaries", "safe_spawn_margin", self.safe_spawn_margin.to_string());

        set("physics", "gravity", self.gravity.to_string());
        set("physics", "tick_rate", self.tick_rate.to_string());

        let t = &self.thrown;
        set("thrown_physics", "max_velocity", t.max_velocity.to_string());
        set("thrown_physics", "min_throw_velocity", t.min_throw_velocity.to_string());
        set("thrown_physics", "throw_duration", t.throw_duration.to_string());
        set("thrown_physics", "bounce_energy_loss", t.bounce_energy_loss.to_string());
        set("thrown_physics", "gravity_multiplier", t.gravity_multiplier.to_string());
        set("thrown_physics", "time_multiplier", t.time_multiplier.to_string());
        set("thrown_physics", "fallback_multiplier", t.fallback_multiplier.to_string());
        set("thrown_physics", "settle_velocity", t.settle_velocity.to_string());

        set("sound", "enabled", self.sound_enabled.to_string());
        set("sound", "volume", self.sound_volume.to_string());

        set("pet", "width", self.pet_width.to_string());
        set("pet", "height", self.pet_height.to_string());
        config
    }

    /// Render the configuration as INI text.
    pub fn to_ini_string(&self) -> String {
        self.to_ini().writes()
    }

    /// Save configuration to the INI file, creating it if needed.
    pub fn save_to_file(&self) -> Result<(), String> {
        self.to_ini()
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;
        info!("Saved config to {:?}", self.config_path);
        Ok(())
    }

    fn summary(&self) -> String {
        format!(
            "screen {}x{}, margins {:?}, gravity {}, tick_rate {}, max_throw {}",
            self.screen_width,
            self.screen_height,
            self.margins,
            self.gravity,
            self.tick_rate,
            self.thrown.max_velocity
        )
    }
}

/// Configuration waiting to replace the active [`PetConfig`] at the next
/// tick boundary.
#[derive(Resource, Debug, Default)]
pub struct PendingConfig(pub Option<PetConfig>);
