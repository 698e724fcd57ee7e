/// LOD chain generation
///
/// Builds a fixed number of simplified index buffers from one deduplicated
/// mesh and packs them back to back, finest first, with a descriptor table
/// the cull stage uses to pick a range per instance.

use bytemuck::{Pod, Zeroable};

use super::loader::{Material, MeshSource};
use super::remap;
use super::simplify;
use super::vertex::Vertex;
use super::BoundingSphere;
use crate::constants::lod;

/// One entry of the LOD table, laid out for a uniform array (16 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LodLevel {
    pub max_distance: f32,
    pub index_offset: u32,
    pub index_count: u32,
    pub _padding: u32,
}

impl LodLevel {
    pub fn new(max_distance: f32, index_offset: u32, index_count: u32) -> Self {
        Self {
            max_distance,
            index_offset,
            index_count,
            _padding: 0,
        }
    }

    pub fn index_range(&self) -> std::ops::Range<u32> {
        self.index_offset..self.index_offset + self.index_count
    }
}

/// GPU copy of the table; unused slots are zeroed
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LodTableGpu {
    pub levels: [LodLevel; lod::MAX_LEVELS],
    pub level_count: u32,
    pub _padding: [u32; 3],
}

/// Level table with a length fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct LodTable {
    levels: Vec<LodLevel>,
}

impl LodTable {
    /// Panics when the level count is outside `1..=MAX_LEVELS`
    pub fn new(levels: Vec<LodLevel>) -> Self {
        assert!(
            !levels.is_empty() && levels.len() <= lod::MAX_LEVELS,
            "LOD table needs 1..={} levels, got {}",
            lod::MAX_LEVELS,
            levels.len()
        );
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> &LodLevel {
        &self.levels[index]
    }

    pub fn coarsest(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn total_index_count(&self) -> u32 {
        self.levels.iter().map(|l| l.index_count).sum()
    }

    /// First level whose band reaches `distance`, else the coarsest
    pub fn select(&self, distance: f32) -> usize {
        self.levels
            .iter()
            .position(|l| l.max_distance >= distance)
            .unwrap_or(self.coarsest())
    }

    pub fn max_distances(&self) -> Vec<f32> {
        self.levels.iter().map(|l| l.max_distance).collect()
    }

    /// Replace the distance bands, keeping them non-decreasing.
    ///
    /// Panics when `distances` does not have one entry per level.
    pub fn set_max_distances(&mut self, distances: &[f32]) {
        assert_eq!(
            distances.len(),
            self.levels.len(),
            "expected {} LOD distances",
            self.levels.len()
        );
        let mut floor = 0.0f32;
        for (level, &d) in self.levels.iter_mut().zip(distances) {
            level.max_distance = d.max(floor);
            floor = level.max_distance;
        }
    }

    pub fn to_gpu(&self) -> LodTableGpu {
        let mut levels = [LodLevel::default(); lod::MAX_LEVELS];
        levels[..self.levels.len()].copy_from_slice(&self.levels);
        LodTableGpu {
            levels,
            level_count: self.levels.len() as u32,
            _padding: [0; 3],
        }
    }
}

/// Parameters for LOD generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodSettings {
    pub levels: usize,
    pub distance_start: f32,
    pub distance_step: f32,
    pub target_error: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            levels: lod::DEFAULT_LEVELS,
            distance_start: lod::DISTANCE_START,
            distance_step: lod::DISTANCE_STEP,
            target_error: lod::TARGET_ERROR,
        }
    }
}

impl From<&crate::config::RendererConfig> for LodSettings {
    fn from(config: &crate::config::RendererConfig) -> Self {
        Self {
            levels: config.lod_levels,
            distance_start: config.lod_distance_start,
            distance_step: config.lod_distance_step,
            target_error: config.target_error,
        }
    }
}

/// Diagnostics for one simplified level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodReportRow {
    pub level: usize,
    pub threshold: f32,
    pub target_index_count: usize,
    pub target_error: f32,
    pub index_count: usize,
    pub error: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodReport {
    /// Rows in generation order, coarsest level first
    pub rows: Vec<LodReportRow>,
}

impl LodReport {
    pub fn log(&self) {
        log::info!("[LodReport] | level | threshold | target indices | target error | indices | error |");
        for row in &self.rows {
            log::info!(
                "[LodReport] | {:^5} | {:.7} | {:>14} | {:.10} | {:>7} | {:.7} |",
                row.level,
                row.threshold,
                row.target_index_count,
                row.target_error,
                row.index_count,
                row.error
            );
        }
    }
}

/// Simplification ratio for a level, counted from the coarsest (step 0)
pub fn lod_threshold(step: usize, levels: usize, base_index_count: usize) -> f32 {
    let lower_bound = lod::THRESHOLD_FLOOR_INDICES / base_index_count as f32;
    lower_bound + (step as f32 / levels as f32) * (1.0 - lower_bound)
}

/// Processed mesh ready for upload
#[derive(Debug, Clone)]
pub struct LodMesh {
    pub vertices: Vec<Vertex>,
    /// All levels back to back, level 0 first
    pub indices: Vec<u32>,
    pub table: LodTable,
    pub report: LodReport,
    pub bounds: BoundingSphere,
    pub material: Material,
}

impl LodMesh {
    pub fn build(source: &MeshSource, settings: &LodSettings) -> Self {
        let corners: Vec<Vertex> = (0..source.corner_count())
            .map(|i| Vertex::new(source.positions[i], source.normals[i], source.tex_coords[i], [1.0; 3]))
            .collect();

        let (unique, mut base) = remap::deduplicate(&corners);
        let vertices = remap::optimize_vertex_fetch(&unique, &mut base);
        log::info!(
            "[LodMesh::build] {} corners -> {} unique vertices, {} indices",
            corners.len(),
            vertices.len(),
            base.len()
        );

        if base.is_empty() {
            log::warn!("[LodMesh::build] Mesh has no faces; every LOD level will be empty");
        }

        let (indices, table, report) = build_chain(&vertices, &base, settings);
        report.log();
        log::info!("[LodMesh::build] Total packed indices: {}", indices.len());

        Self {
            bounds: BoundingSphere::from_vertices(&vertices),
            vertices,
            indices,
            table,
            report,
            material: source.material,
        }
    }
}

/// Generate and pack the LOD chain for an already deduplicated mesh
pub fn build_chain(vertices: &[Vertex], base: &[u32], settings: &LodSettings) -> (Vec<u32>, LodTable, LodReport) {
    let levels = settings.levels;
    assert!(levels >= 1 && levels <= lod::MAX_LEVELS, "invalid LOD level count {}", levels);

    let mut chain: Vec<Vec<u32>> = vec![Vec::new(); levels];
    chain[0] = base.to_vec();
    let mut report = LodReport::default();

    if !base.is_empty() {
        for step in 0..levels - 1 {
            let level = levels - 1 - step;
            let threshold = lod_threshold(step, levels, base.len());
            let target_index_count = (base.len() as f32 * threshold) as usize;

            let simplified = simplify::simplify(vertices, base, target_index_count, settings.target_error);
            report.rows.push(LodReportRow {
                level,
                threshold,
                target_index_count,
                target_error: settings.target_error,
                index_count: simplified.indices.len(),
                error: simplified.error,
            });
            chain[level] = simplified.indices;
        }
    }

    let mut packed = Vec::with_capacity(chain.iter().map(Vec::len).sum());
    let mut table = Vec::with_capacity(levels);
    let mut max_distance = settings.distance_start;
    for level_indices in &chain {
        table.push(LodLevel::new(max_distance, packed.len() as u32, level_indices.len() as u32));
        packed.extend_from_slice(level_indices);
        max_distance += settings.distance_step;
    }
    if let Some(last) = table.last_mut() {
        last.max_distance = lod::DISTANCE_SENTINEL;
    }

    (packed, LodTable::new(table), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::simplify::tests::uv_sphere;

    #[test]
    fn threshold_matches_reference_points() {
        // 30000 indices: floor 0.1, steps of 0.18 per level out of 5
        assert!((lod_threshold(0, 5, 30_000) - 0.1).abs() < 1e-6);
        assert!((lod_threshold(3, 5, 30_000) - (0.1 + 0.6 * 0.9)).abs() < 1e-6);
    }

    #[test]
    fn small_mesh_floor_exceeds_one() {
        // Meshes under 3000 indices never ask for a reduction
        assert!(lod_threshold(0, 5, 36) > 1.0);
    }

    #[test]
    fn selection_falls_back_to_coarsest() {
        let table = LodTable::new(vec![
            LodLevel::new(8.0, 0, 30),
            LodLevel::new(10.0, 30, 20),
            LodLevel::new(f32::MAX, 50, 10),
        ]);
        assert_eq!(table.select(0.0), 0);
        assert_eq!(table.select(8.0), 0);
        assert_eq!(table.select(9.0), 1);
        assert_eq!(table.select(1.0e9), 2);
        assert_eq!(table.select(f32::INFINITY), 2);
    }

    #[test]
    fn set_distances_never_decrease() {
        let mut table = LodTable::new(vec![LodLevel::new(1.0, 0, 3); 3]);
        table.set_max_distances(&[5.0, 2.0, 50.0]);
        assert_eq!(table.max_distances(), vec![5.0, 5.0, 50.0]);
    }

    #[test]
    #[should_panic]
    fn wrong_distance_count_panics() {
        let mut table = LodTable::new(vec![LodLevel::new(1.0, 0, 3); 3]);
        table.set_max_distances(&[1.0]);
    }

    #[test]
    fn gpu_table_pads_unused_levels() {
        let table = LodTable::new(vec![LodLevel::new(8.0, 0, 36), LodLevel::new(f32::MAX, 36, 12)]);
        let gpu = table.to_gpu();
        assert_eq!(gpu.level_count, 2);
        assert_eq!(gpu.levels[1].index_offset, 36);
        assert_eq!(gpu.levels[2], LodLevel::default());
        assert_eq!(std::mem::size_of::<LodTableGpu>() % 16, 0);
    }

    #[test]
    fn report_has_one_row_per_simplified_level() {
        let (vertices, indices) = uv_sphere(48, 64);
        let (packed, table, report) = build_chain(&vertices, &indices, &LodSettings::default());

        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.rows[0].level, 4);
        assert_eq!(report.rows[3].level, 1);
        assert_eq!(table.level(0).index_count as usize, indices.len());
        assert_eq!(packed.len() as u32, table.total_index_count());
    }
}
