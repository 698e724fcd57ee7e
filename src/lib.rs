//! Swarm renderer
//!
//! GPU-driven rendering of a large population of instances of one mesh. A
//! compute pass culls every instance against the frustum and a depth pyramid
//! and picks a LOD level, writing one indirect draw per instance; a deferred
//! pipeline then draws what survived. Culling runs twice per frame so that
//! instances disoccluded this frame are never missing.

pub mod app;
pub mod camera;
pub mod config;
pub mod constants;
pub mod culling;
pub mod error;
pub mod gpu;
pub mod input;
pub mod instance;
pub mod mesh;
pub mod renderer;

pub use camera::{Camera, Light, Movement};
pub use config::{RendererConfig, WindowConfig};
pub use error::{RendererError, Result};
pub use instance::{InstanceData, InstanceStore};
pub use mesh::{LodMesh, LodSettings, LodTable, MeshSource};
pub use renderer::{DebugSettings, DisplayMode, FrameStats, OverlayRenderer, Renderer};
