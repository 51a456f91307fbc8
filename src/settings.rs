//! Physics tuning and hardware profiles
//!
//! Loaded once at startup from JSON (or defaults) and handed to the simulation
//! context. Nothing here changes mid-tick.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::TILE_SIZE;

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Target hardware profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Profile {
    /// Constrained handheld device
    #[default]
    Handheld,
    /// Desktop simulator fallback
    Desktop,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Handheld => "Handheld",
            Profile::Desktop => "Desktop",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "handheld" | "device" => Some(Profile::Handheld),
            "desktop" | "sim" | "simulator" => Some(Profile::Desktop),
            _ => None,
        }
    }

    /// Constraint relaxation passes per rope update
    pub fn rope_iterations(&self) -> u32 {
        match self {
            Profile::Handheld => 6,
            Profile::Desktop => 10,
        }
    }

    /// Upper bound on mover sub-steps per axis
    pub fn max_substeps(&self) -> u32 {
        match self {
            Profile::Handheld => 4,
            Profile::Desktop => 8,
        }
    }

    /// Frame scratch arena size in bytes
    pub fn scratch_bytes(&self) -> usize {
        match self {
            Profile::Handheld => 8 * 1024,
            Profile::Desktop => 64 * 1024,
        }
    }
}

/// Physics tuning values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub profile: Profile,

    // === Hero movement ===
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Terminal fall speed (units/s)
    pub max_fall_speed: f32,
    /// Horizontal run speed (units/s)
    pub run_speed: f32,
    /// Horizontal acceleration on the ground (units/s²)
    pub ground_accel: f32,
    /// Horizontal acceleration in the air (units/s²)
    pub air_accel: f32,
    /// Initial jump speed (units/s)
    pub jump_speed: f32,

    // === Mover ===
    /// Longest single sweep before the mover sub-steps
    pub max_step_distance: f32,
    /// Sub-step cap per tick
    pub max_substeps: u32,
    /// How far feet may sit above or sink into a slope and still snap to it
    pub slope_tolerance: f32,

    // === Registry / scratch ===
    /// Fixed capacity of the solid registry
    pub registry_capacity: u32,
    /// Frame scratch arena size in bytes
    pub scratch_bytes: usize,

    // === Rope ===
    /// Hook tip travel speed (units/s)
    pub hook_speed: f32,
    /// Maximum nodes in a materialised chain
    pub max_rope_nodes: usize,
    /// Rest length of every chain link
    pub rope_segment_length: f32,
    /// Constraint relaxation passes per update
    pub rope_iterations: u32,
    /// Verlet velocity retention (1.0 = none lost)
    pub rope_damping: f32,
    /// Pull per unit of first-link stretch (units/s² per unit)
    pub tension_stiffness: f32,
    /// Tension magnitude cap (units/s²)
    pub max_tension: f32,
    /// Nodes reeled in per tick while retracting
    pub retract_nodes_per_tick: usize,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self::from_profile(Profile::Handheld)
    }
}

impl PhysicsSettings {
    /// Create settings with profile-dependent defaults applied
    pub fn from_profile(profile: Profile) -> Self {
        Self {
            profile,

            gravity: 900.0,
            max_fall_speed: 420.0,
            run_speed: 110.0,
            ground_accel: 900.0,
            air_accel: 450.0,
            jump_speed: 300.0,

            max_step_distance: TILE_SIZE / 2.0,
            max_substeps: profile.max_substeps(),
            slope_tolerance: 4.0,

            registry_capacity: 64,
            scratch_bytes: profile.scratch_bytes(),

            hook_speed: 480.0,
            max_rope_nodes: 24,
            rope_segment_length: 8.0,
            rope_iterations: profile.rope_iterations(),
            rope_damping: 0.99,
            tension_stiffness: 60.0,
            max_tension: 1500.0,
            retract_nodes_per_tick: 1,
        }
    }

    /// Switch profile, updating profile-dependent values only
    pub fn apply_profile(&mut self, profile: Profile) {
        self.profile = profile;
        self.max_substeps = profile.max_substeps();
        self.scratch_bytes = profile.scratch_bytes();
        self.rope_iterations = profile.rope_iterations();
    }

    /// Reject values the solvers cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field, reason| Err(SettingsError::Invalid { field, reason });

        if !(self.rope_segment_length > 0.0) {
            return invalid("rope_segment_length", "must be positive");
        }
        if self.max_rope_nodes < 2 {
            return invalid("max_rope_nodes", "a chain needs at least two nodes");
        }
        if self.rope_iterations == 0 {
            return invalid("rope_iterations", "must be at least one");
        }
        if !(0.0..=1.0).contains(&self.rope_damping) {
            return invalid("rope_damping", "must be within 0..=1");
        }
        if !(self.max_step_distance > 0.0) || self.max_step_distance > TILE_SIZE {
            return invalid("max_step_distance", "must be within (0, tile size]");
        }
        if self.max_substeps == 0 {
            return invalid("max_substeps", "must be at least one");
        }
        if self.slope_tolerance < 0.0 {
            return invalid("slope_tolerance", "must not be negative");
        }
        if self.registry_capacity == 0 {
            return invalid("registry_capacity", "must be at least one");
        }
        if self.max_tension < 0.0 || self.tension_stiffness < 0.0 {
            return invalid("max_tension", "tension values must not be negative");
        }
        if self.retract_nodes_per_tick == 0 {
            return invalid("retract_nodes_per_tick", "must be at least one");
        }
        Ok(())
    }

    /// Parse and validate settings from a JSON document
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!(
            "Loaded {} physics settings from {}",
            settings.profile.as_str(),
            path.as_ref().display()
        );
        Ok(settings)
    }

    /// Load settings, falling back to profile defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>, profile: Profile) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default {} settings: {}", profile.as_str(), e);
                Self::from_profile(profile)
            }
        }
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
