//! Error handling for the swarm renderer
//!
//! Setup failures (adapter, device, surface, assets, config) are fatal and
//! propagate to the binary. Per-frame surface problems are handled by the
//! resize path and never show up here.

use std::path::{Path, PathBuf};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, RendererError>;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("No suitable GPU adapter found (tried high-performance, low-power and fallback)")]
    NoAdapter,

    #[error("GPU device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Adapter does not support required feature(s): {0:?}")]
    MissingFeature(wgpu::Features),

    #[error("Adapter limit {name} is {available}, need at least {required}")]
    MissingLimit {
        name: &'static str,
        available: u32,
        required: u32,
    },

    #[error("Surface creation failed: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    #[error("Surface reports no usable texture format for this adapter")]
    NoSurfaceFormat,

    #[error("Failed to load asset {path}: {reason}")]
    AssetLoad { path: PathBuf, reason: String },

    #[error("Texture decode failed: {0}")]
    TextureDecode(#[from] image::ImageError),

    #[error("Invalid frame plan: {0}")]
    FramePlan(#[from] crate::renderer::frame_graph::PlanError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RendererError {
    pub fn asset(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::AssetLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Helper trait for naming the asset behind a foreign error
pub trait ErrorContext<T> {
    fn asset_context(self, path: &Path) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn asset_context(self, path: &Path) -> Result<T> {
        self.map_err(|e| RendererError::asset(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_error_names_the_path() {
        let err = RendererError::asset("assets/chicken.obj", "file not found");
        let msg = err.to_string();
        assert!(msg.contains("assets/chicken.obj"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn asset_context_keeps_the_reason() {
        let raw: std::result::Result<(), &str> = Err("unexpected token");
        let err = raw.asset_context(Path::new("assets/model.obj")).unwrap_err();
        assert!(matches!(err, RendererError::AssetLoad { .. }));
        assert_eq!(err.to_string(), "Failed to load asset assets/model.obj: unexpected token");
    }
}
