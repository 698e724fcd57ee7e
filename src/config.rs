//! Renderer configuration
//!
//! Loaded from an optional TOML file; every field has a default so a partial
//! file (or no file at all) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{frames, instances, light, lod};
use crate::error::{RendererError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Swarm Renderer".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub window: WindowConfig,

    /// Number of mesh instances scattered in the scene
    pub instance_count: u32,

    /// LOD levels generated for the mesh, including the full-resolution level
    pub lod_levels: usize,
    pub lod_distance_start: f32,
    pub lod_distance_step: f32,
    pub target_error: f32,

    /// Seed for instance placement; `None` draws from OS entropy
    pub seed: Option<u64>,

    pub shadow_map_size: u32,
    pub frames_in_flight: usize,

    pub model_path: PathBuf,
    pub texture_path: Option<PathBuf>,

    /// Record GPU timestamps for the performance counters when supported
    pub enable_gpu_timing: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            instance_count: instances::DEFAULT_COUNT,
            lod_levels: lod::DEFAULT_LEVELS,
            lod_distance_start: lod::DISTANCE_START,
            lod_distance_step: lod::DISTANCE_STEP,
            target_error: lod::TARGET_ERROR,
            seed: None,
            shadow_map_size: light::SHADOW_MAP_SIZE,
            frames_in_flight: frames::DEFAULT_IN_FLIGHT,
            model_path: PathBuf::from("assets/model.obj"),
            texture_path: None,
            enable_gpu_timing: true,
        }
    }
}

impl RendererConfig {
    /// Parse and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("[RendererConfig::load] Reading {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(RendererError::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.instance_count == 0 {
            return Err(RendererError::Config("instance_count must be at least 1".into()));
        }
        if self.lod_levels == 0 || self.lod_levels > lod::MAX_LEVELS {
            return Err(RendererError::Config(format!(
                "lod_levels must be in 1..={}, got {}",
                lod::MAX_LEVELS,
                self.lod_levels
            )));
        }
        if !(self.lod_distance_start >= 0.0) || !(self.lod_distance_step > 0.0) {
            return Err(RendererError::Config(format!(
                "lod distances must be start >= 0 and step > 0, got start {} step {}",
                self.lod_distance_start, self.lod_distance_step
            )));
        }
        if !(self.target_error > 0.0) {
            return Err(RendererError::Config(format!(
                "target_error must be positive, got {}",
                self.target_error
            )));
        }
        if !self.shadow_map_size.is_power_of_two() {
            return Err(RendererError::Config(format!(
                "shadow_map_size must be a power of two, got {}",
                self.shadow_map_size
            )));
        }
        if self.frames_in_flight == 0 || self.frames_in_flight > frames::MAX_IN_FLIGHT {
            return Err(RendererError::Config(format!(
                "frames_in_flight must be in 1..={}, got {}",
                frames::MAX_IN_FLIGHT,
                self.frames_in_flight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instance_count, 150_000);
        assert_eq!(config.lod_levels, 5);
        assert_eq!(config.frames_in_flight, 2);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RendererConfig::from_toml(
            r#"
            instance_count = 1000
            seed = 7

            [window]
            width = 800
            "#,
        )
        .unwrap();

        assert_eq!(config.instance_count, 1000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.lod_levels, 5);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(RendererConfig::from_toml("lod_levels = 0").is_err());
        assert!(RendererConfig::from_toml("frames_in_flight = 4").is_err());
        assert!(RendererConfig::from_toml("shadow_map_size = 1000").is_err());
        assert!(RendererConfig::from_toml("lod_distance_step = 0.0").is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = RendererConfig::from_toml("instance_count = \"many\"").unwrap_err();
        assert!(matches!(err, RendererError::Toml(_)));
    }
}
