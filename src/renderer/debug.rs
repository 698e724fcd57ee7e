//! Debug control surface
//!
//! Everything an overlay or keyboard shortcut may change at runtime, plus the
//! read-only statistics handed to the overlay each frame.

use crate::camera::Light;
use crate::constants::light;
use crate::gpu::{PerfCounters, TimedStage};
use crate::mesh::{LodTable, Material};

/// What the lighting pass writes to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    Normals,
    Depth,
    Specularity,
    Albedo,
    Shadow,
    Position,
    /// One mip of the depth pyramid
    PyramidMip(u32),
    /// Lit scene with each instance's screen-space bounds drawn on top
    BoundsMesh,
    /// Bounding spheres instead of meshes, with screen-space bounds
    BoundsSphere,
    /// Instances coloured by selected LOD level
    LodLevel,
    Composed,
}

impl DisplayMode {
    const PYRAMID_BASE: u32 = 7;
    const PYRAMID_LAST: u32 = 20;

    /// Order used by keyboard cycling
    const CYCLE: [DisplayMode; 11] = [
        DisplayMode::Composed,
        DisplayMode::Normals,
        DisplayMode::Depth,
        DisplayMode::Specularity,
        DisplayMode::Albedo,
        DisplayMode::Shadow,
        DisplayMode::Position,
        DisplayMode::PyramidMip(0),
        DisplayMode::BoundsMesh,
        DisplayMode::BoundsSphere,
        DisplayMode::LodLevel,
    ];

    /// Code shared with the shaders
    pub fn code(self) -> u32 {
        match self {
            DisplayMode::Normals => 0,
            DisplayMode::Depth => 1,
            DisplayMode::Specularity => 2,
            DisplayMode::Albedo => 3,
            DisplayMode::Shadow => 4,
            DisplayMode::Position => 5,
            DisplayMode::PyramidMip(mip) => Self::PYRAMID_BASE + mip.min(Self::PYRAMID_LAST - Self::PYRAMID_BASE),
            DisplayMode::BoundsMesh => 21,
            DisplayMode::BoundsSphere => 22,
            DisplayMode::LodLevel => 23,
            DisplayMode::Composed => 24,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => DisplayMode::Normals,
            1 => DisplayMode::Depth,
            2 => DisplayMode::Specularity,
            3 => DisplayMode::Albedo,
            4 => DisplayMode::Shadow,
            5 => DisplayMode::Position,
            Self::PYRAMID_BASE..=Self::PYRAMID_LAST => DisplayMode::PyramidMip(code - Self::PYRAMID_BASE),
            21 => DisplayMode::BoundsMesh,
            22 => DisplayMode::BoundsSphere,
            23 => DisplayMode::LodLevel,
            24 => DisplayMode::Composed,
            _ => return None,
        })
    }

    fn cycle_position(self) -> usize {
        let key = match self {
            DisplayMode::PyramidMip(_) => DisplayMode::PyramidMip(0),
            other => other,
        };
        Self::CYCLE.iter().position(|&m| m == key).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::CYCLE[(self.cycle_position() + 1) % Self::CYCLE.len()]
    }

    pub fn previous(self) -> Self {
        let len = Self::CYCLE.len();
        Self::CYCLE[(self.cycle_position() + len - 1) % len]
    }

    /// Move between pyramid mips, staying within `level_count`
    pub fn step_mip(self, delta: i32, level_count: u32) -> Self {
        match self {
            DisplayMode::PyramidMip(mip) => {
                let last = level_count.saturating_sub(1) as i64;
                DisplayMode::PyramidMip((mip as i64 + delta as i64).clamp(0, last) as u32)
            }
            other => other,
        }
    }

    /// Bounds overlay is drawn after lighting
    pub fn shows_bounds(self) -> bool {
        matches!(self, DisplayMode::BoundsMesh | DisplayMode::BoundsSphere)
    }
}

impl Default for DisplayMode {
    fn default() -> Self {
        DisplayMode::Composed
    }
}

/// Runtime toggles and tunables
#[derive(Debug, Clone, PartialEq)]
pub struct DebugSettings {
    pub model_enabled: bool,
    pub texture_enabled: bool,
    pub lighting_enabled: bool,
    pub pcf_enabled: bool,
    pub frustum_culling: bool,
    pub occlusion_culling: bool,

    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub material: Material,

    pub light: Light,
    pub display_mode: DisplayMode,

    shadow_bias: f32,
    lod_distances: Vec<f32>,
}

impl DebugSettings {
    pub fn new(material: Material, lod: &LodTable) -> Self {
        Self {
            model_enabled: true,
            texture_enabled: true,
            lighting_enabled: true,
            pcf_enabled: true,
            frustum_culling: true,
            occlusion_culling: true,
            ambient: 0.2,
            diffuse: 0.5,
            specular: 0.1,
            material,
            light: Light::default(),
            display_mode: DisplayMode::default(),
            shadow_bias: 0.0,
            lod_distances: lod.max_distances(),
        }
    }

    pub fn shadow_bias(&self) -> f32 {
        self.shadow_bias
    }

    pub fn set_shadow_bias(&mut self, bias: f32) {
        self.shadow_bias = bias.clamp(-light::MAX_SHADOW_BIAS, light::MAX_SHADOW_BIAS);
    }

    pub fn lod_distances(&self) -> &[f32] {
        &self.lod_distances
    }

    /// Set one level's max distance, clamped between its neighbours
    pub fn set_lod_distance(&mut self, level: usize, distance: f32) {
        let Some(&current) = self.lod_distances.get(level) else {
            log::warn!("[DebugSettings::set_lod_distance] No LOD level {}", level);
            return;
        };
        let lower = if level == 0 { 0.0 } else { self.lod_distances[level - 1] };
        let upper = self.lod_distances.get(level + 1).copied().unwrap_or(f32::MAX);
        let clamped = distance.clamp(lower, upper);
        if clamped != current {
            self.lod_distances[level] = clamped;
        }
    }

    /// Scale every non-sentinel band by `factor`
    pub fn scale_lod_distances(&mut self, factor: f32) {
        let last = self.lod_distances.len().saturating_sub(1);
        for distance in &mut self.lod_distances[..last] {
            *distance *= factor;
        }
    }

    /// Push edited distances into the table the cull stage reads
    pub fn apply_lod_distances(&self, table: &mut LodTable) {
        table.set_max_distances(&self.lod_distances);
    }
}

/// Read-only numbers handed to the overlay
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frame: u64,
    pub cpu_frame_ms: f32,
    pub instance_count: u32,
    pub lod_levels: usize,
    pub display_mode: Option<DisplayMode>,
    /// Average GPU milliseconds per timed stage; empty without timestamp support
    pub gpu_ms: Vec<(TimedStage, f32)>,
}

impl FrameStats {
    pub fn gather(frame: u64, cpu_frame_ms: f32, instance_count: u32, settings: &DebugSettings, perf: &PerfCounters) -> Self {
        Self {
            frame,
            cpu_frame_ms,
            instance_count,
            lod_levels: settings.lod_distances.len(),
            display_mode: Some(settings.display_mode),
            gpu_ms: TimedStage::ALL
                .iter()
                .filter_map(|&stage| perf.average(stage).map(|ms| (stage, ms)))
                .collect(),
        }
    }
}

/// Draws on top of the finished frame.
///
/// Called once per frame after the scene, with the surface view as backdrop.
/// Implementations record into the given encoder and must not block.
pub trait OverlayRenderer {
    fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        stats: &FrameStats,
    );
}

/// Overlay that reports the frame statistics through the log
pub struct LogOverlay {
    interval: u64,
}

impl LogOverlay {
    pub fn new(interval_frames: u64) -> Self {
        Self {
            interval: interval_frames.max(1),
        }
    }
}

impl OverlayRenderer for LogOverlay {
    fn render(
        &mut self,
        _device: &wgpu::Device,
        _queue: &wgpu::Queue,
        _encoder: &mut wgpu::CommandEncoder,
        _target: &wgpu::TextureView,
        stats: &FrameStats,
    ) {
        if stats.frame % self.interval != 0 {
            return;
        }
        log::info!(
            "[LogOverlay] frame {} cpu {:.2} ms, {} instances, mode {:?}",
            stats.frame,
            stats.cpu_frame_ms,
            stats.instance_count,
            stats.display_mode
        );
        for (stage, ms) in &stats.gpu_ms {
            log::info!("[LogOverlay]   {:<14} {:.3} ms", stage.label(), ms);
        }
    }
}
