//! Depth pyramid geometry and a CPU reduction.
//!
//! The GPU builder in `renderer::depth_pyramid` uses [`PyramidLayout`] for its
//! mip sizes and dispatch counts; [`PyramidLevels`] performs the same
//! max-reduction on the CPU for tests and debugging.

use crate::constants::workgroups;

use super::cull::DepthSource;

/// Mip layout of the pyramid for a given screen size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidLayout {
    /// Next power of two at or above the larger screen side
    pub base: u32,
    /// Size of every mip, level 0 first
    pub levels: Vec<(u32, u32)>,
}

impl PyramidLayout {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        let base = screen_width.max(screen_height).max(1).next_power_of_two();
        let first = (base / 2).max(1);

        let mut levels = vec![(first, first)];
        let (mut w, mut h) = (first, first);
        while w > 1 || h > 1 {
            w = w.div_ceil(2).max(1);
            h = h.div_ceil(2).max(1);
            levels.push((w, h));
        }

        Self { base, levels }
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Side of mip 0; the texture is square
    pub fn size(&self) -> u32 {
        self.levels[0].0
    }

    /// Workgroups needed to cover `level` with square tiles
    pub fn dispatch_size(&self, level: usize) -> (u32, u32) {
        let (w, h) = self.levels[level];
        (w.div_ceil(workgroups::PYRAMID_TILE), h.div_ceil(workgroups::PYRAMID_TILE))
    }
}

/// CPU copy of every pyramid mip
#[derive(Debug, Clone)]
pub struct PyramidLevels {
    layout: PyramidLayout,
    mips: Vec<Vec<f32>>,
}

impl PyramidLevels {
    /// Max-reduce a row-major depth image of `width x height` texels
    pub fn build(depth: &[f32], width: u32, height: u32) -> Self {
        assert_eq!(depth.len(), (width * height) as usize, "depth image size mismatch");
        let layout = PyramidLayout::new(width, height);

        let mut mips: Vec<Vec<f32>> = Vec::with_capacity(layout.levels.len());
        for (level, &(w, h)) in layout.levels.iter().enumerate() {
            let mut mip = vec![0.0; (w * h) as usize];
            for y in 0..h {
                for x in 0..w {
                    mip[(y * w + x) as usize] = if level == 0 {
                        reduce_2x2(depth, width, height, x, y)
                    } else {
                        let (pw, ph) = layout.levels[level - 1];
                        reduce_2x2(&mips[level - 1], pw, ph, x, y)
                    };
                }
            }
            mips.push(mip);
        }

        Self { layout, mips }
    }

    /// Pyramid filled with one depth value, for synthetic occlusion setups
    pub fn uniform(screen_width: u32, screen_height: u32, depth: f32) -> Self {
        let layout = PyramidLayout::new(screen_width, screen_height);
        let mips = layout.levels.iter().map(|&(w, h)| vec![depth; (w * h) as usize]).collect();
        Self { layout, mips }
    }

    pub fn layout(&self) -> &PyramidLayout {
        &self.layout
    }

    pub fn mip(&self, level: usize) -> &[f32] {
        &self.mips[level]
    }
}

impl DepthSource for PyramidLevels {
    fn level_count(&self) -> u32 {
        self.layout.level_count()
    }

    fn level_size(&self, level: u32) -> (u32, u32) {
        self.layout.levels[level as usize]
    }

    fn load(&self, level: u32, x: u32, y: u32) -> f32 {
        let (w, h) = self.level_size(level);
        let (x, y) = (x.min(w - 1), y.min(h - 1));
        self.mips[level as usize][(y * w + x) as usize]
    }
}

/// Max of the 2x2 source block behind destination texel (x, y), reads clamped to the edge
fn reduce_2x2(src: &[f32], width: u32, height: u32, x: u32, y: u32) -> f32 {
    let mut depth = 0.0f32;
    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        let sx = (x * 2 + dx).min(width - 1);
        let sy = (y * 2 + dy).min(height - 1);
        depth = depth.max(src[(sy * width + sx) as usize]);
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_for_common_resolutions() {
        let layout = PyramidLayout::new(1280, 720);
        assert_eq!(layout.base, 2048);
        assert_eq!(layout.levels[0], (1024, 1024));
        assert_eq!(layout.level_count(), 11);
        assert_eq!(*layout.levels.last().unwrap(), (1, 1));

        let layout = PyramidLayout::new(1024, 1024);
        assert_eq!(layout.base, 1024);
        assert_eq!(layout.levels[0], (512, 512));
        assert_eq!(layout.level_count(), 10);
    }

    #[test]
    fn tiny_screen_still_has_one_level() {
        let layout = PyramidLayout::new(1, 1);
        assert_eq!(layout.levels, vec![(1, 1)]);
        assert_eq!(layout.level_count(), 1);
    }

    #[test]
    fn dispatch_covers_every_texel() {
        let layout = PyramidLayout::new(1920, 1080);
        assert_eq!(layout.dispatch_size(0), (32, 32));
        assert_eq!(layout.dispatch_size(5), (1, 1));
        assert_eq!(*layout.levels.last().unwrap(), (1, 1));
    }

    #[test]
    fn reduction_keeps_farthest_depth() {
        #[rustfmt::skip]
        let depth = [
            0.1, 0.2, 0.3, 0.4,
            0.5, 0.9, 0.1, 0.1,
            0.2, 0.2, 0.3, 0.3,
            0.2, 0.2, 0.3, 0.8,
        ];
        let pyramid = PyramidLevels::build(&depth, 4, 4);
        assert_eq!(pyramid.layout().levels, vec![(2, 2), (1, 1)]);
        assert_eq!(pyramid.mip(0), &[0.9, 0.4, 0.2, 0.8]);
        assert_eq!(pyramid.mip(1), &[0.9]);
    }

    #[test]
    fn non_square_source_clamps_reads() {
        // 3x1 screen letterboxed into a 4x4 virtual square; mip 0 is 2x2
        let depth = [0.3, 0.6, 0.2];
        let pyramid = PyramidLevels::build(&depth, 3, 1);
        assert_eq!(pyramid.layout().levels[0], (2, 2));
        assert_eq!(pyramid.load(0, 0, 0), 0.6);
        assert_eq!(pyramid.load(0, 1, 0), 0.2);
        assert_eq!(pyramid.load(0, 1, 1), 0.2);
    }
}
