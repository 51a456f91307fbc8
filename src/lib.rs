//! Hookshot - deterministic physics core for a tile-based action platformer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tiles, collision, movement, rope, scratch)
//! - `platform`: Handheld/desktop-simulator backend abstraction
//! - `settings`: Data-driven physics tuning

pub mod platform;
pub mod settings;
pub mod sim;

pub use settings::{PhysicsSettings, Profile, SettingsError};

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, matches the handheld refresh)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum ticks run per host frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;
    /// Host frame time clamp (seconds)
    pub const MAX_FRAME_TIME: f32 = 0.1;

    /// Tile edge length in world units
    pub const TILE_SIZE: f32 = 16.0;

    /// Hero collision box (half extents)
    pub const HERO_HALF_WIDTH: f32 = 6.0;
    pub const HERO_HALF_HEIGHT: f32 = 8.0;

    /// Floating point slack for contact tests
    pub const CONTACT_EPSILON: f32 = 1.0e-3;
}

/// Move `current` toward `target` by at most `max_delta`
#[inline]
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}

/// Clamp a vector's length to `max_len` (zero-safe)
#[inline]
pub fn clamp_length(v: Vec2, max_len: f32) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq > max_len * max_len && len_sq > 0.0 {
        v * (max_len / len_sq.sqrt())
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach_clamps_to_target() {
        assert_eq!(approach(0.0, 10.0, 3.0), 3.0);
        assert_eq!(approach(9.0, 10.0, 3.0), 10.0);
        assert_eq!(approach(5.0, -5.0, 20.0), -5.0);
    }

    #[test]
    fn test_clamp_length() {
        let v = clamp_length(Vec2::new(30.0, 40.0), 10.0);
        assert!((v.length() - 10.0).abs() < 1e-4);
        assert_eq!(clamp_length(Vec2::ZERO, 1.0), Vec2::ZERO);
        assert_eq!(clamp_length(Vec2::new(1.0, 0.0), 5.0), Vec2::new(1.0, 0.0));
    }
}
