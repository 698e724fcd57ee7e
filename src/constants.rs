// Swarm renderer constants - SINGLE SOURCE OF TRUTH
//
// CPU-side values shared between the mesh processor, the culling reference and
// the GPU passes. WGSL shaders mirror the ones marked "shader".

/// LOD table defaults
pub mod lod {
    /// Number of LOD levels including the full-resolution level
    pub const DEFAULT_LEVELS: usize = 5;

    /// Index count the coarsest level is allowed to shrink to, as a ratio numerator
    pub const THRESHOLD_FLOOR_INDICES: f32 = 3000.0;

    /// Target simplification error in normalized mesh space
    pub const TARGET_ERROR: f32 = 0.02;

    /// Distance band of level 0 and the step between successive levels
    pub const DISTANCE_START: f32 = 8.0;
    pub const DISTANCE_STEP: f32 = 2.0;

    /// Distance assigned to the coarsest level so it catches every remaining instance
    pub const DISTANCE_SENTINEL: f32 = f32::MAX;

    /// Upper bound on levels the GPU table can hold (shader)
    pub const MAX_LEVELS: usize = 8;
}

/// Instance population defaults
pub mod instances {
    pub const DEFAULT_COUNT: u32 = 150_000;

    /// Half extent of the cube instances are scattered in
    pub const SPREAD: f32 = 5.0;

    /// Offset of the scatter cube from the origin
    pub const CENTER_OFFSET: [f32; 3] = [17.0, 0.0, 0.0];

    pub const MIN_SCALE: f32 = 0.1;
    pub const MAX_SCALE: f32 = 5.0;
}

/// Camera defaults
pub mod camera {
    pub const START_POSITION: [f32; 3] = [-2.0, 0.0, 0.0];
    pub const START_YAW_DEGREES: f32 = 0.0;
    pub const START_PITCH_DEGREES: f32 = 0.0;

    pub const FOV_Y_DEGREES: f32 = 45.0;
    pub const ZNEAR: f32 = 0.001;
    pub const ZFAR: f32 = 250.0;

    pub const MOVE_SPEED: f32 = 2.5;
    pub const MOUSE_SENSITIVITY: f32 = 0.1;
    pub const SPRINT_MULTIPLIER: f32 = 4.0;
    pub const CRAWL_DIVISOR: f32 = 10.0;
    pub const PITCH_LIMIT_DEGREES: f32 = 89.0;
}

/// Shadow-casting light defaults
pub mod light {
    /// Light position before rotation; the light always looks at the origin
    pub const BASE_POSITION: [f32; 3] = [-2.5, 0.0, 0.0];
    pub const FOV_Y_DEGREES: f32 = 45.0;
    pub const ZNEAR: f32 = 0.001;
    pub const ZFAR: f32 = 4.0;

    pub const SHADOW_MAP_SIZE: u32 = 2048;
    pub const MAX_SHADOW_BIAS: f32 = 0.001;
}

/// Compute workgroup sizes (shader)
pub mod workgroups {
    /// Cull stage: one invocation per instance
    pub const CULL: u32 = 64;

    /// Depth pyramid: square tiles of invocations
    pub const PYRAMID_TILE: u32 = 32;
}

/// Frame pacing
pub mod frames {
    pub const DEFAULT_IN_FLIGHT: usize = 2;
    pub const MAX_IN_FLIGHT: usize = 3;

    /// Samples kept per performance counter
    pub const PERF_HISTORY: usize = 1000;
}
