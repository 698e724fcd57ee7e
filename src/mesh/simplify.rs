/// Mesh Simplification
///
/// Quadric error metric edge collapse over a shared vertex buffer. Collapses
/// move one endpoint onto the other instead of creating new vertices, so every
/// simplified index buffer stays valid against the original vertices.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{DMat4, DVec3, DVec4};
use rustc_hash::{FxHashMap, FxHashSet};

use super::vertex::Vertex;

/// Quadric error matrix for vertex
#[derive(Debug, Clone, Copy)]
struct Quadric {
    matrix: DMat4,
}

impl Quadric {
    fn zero() -> Self {
        Self { matrix: DMat4::ZERO }
    }

    /// Create quadric from plane equation
    fn from_plane(plane: DVec4) -> Self {
        Self {
            matrix: DMat4::from_cols(
                plane * plane.x,
                plane * plane.y,
                plane * plane.z,
                plane * plane.w,
            ),
        }
    }

    fn add(&self, other: &Quadric) -> Quadric {
        Quadric {
            matrix: self.matrix + other.matrix,
        }
    }

    /// Squared distance sum to the accumulated planes
    fn evaluate(&self, pos: DVec3) -> f64 {
        let v = pos.extend(1.0);
        v.dot(self.matrix * v).max(0.0)
    }
}

/// Edge collapse candidate: `from` is removed and its corners move to `to`
#[derive(Debug, Clone)]
struct CollapseCandidate {
    from: u32,
    to: u32,
    error: f64,
    from_version: u32,
    to_version: u32,
}

impl PartialEq for CollapseCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.error.total_cmp(&other.error) == Ordering::Equal
    }
}

impl Eq for CollapseCandidate {}

impl PartialOrd for CollapseCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CollapseCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap behavior
        other.error.total_cmp(&self.error)
    }
}

/// Result of one simplification run
#[derive(Debug, Clone, Default)]
pub struct Simplified {
    pub indices: Vec<u32>,
    /// Largest collapse error, relative to the mesh extent
    pub error: f32,
}

/// Mesh simplifier using quadric error metrics
pub struct MeshSimplifier {
    positions: Vec<DVec3>,
    quadrics: Vec<Quadric>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    removed: Vec<bool>,
    /// Border vertices never move so open edges keep their outline
    locked: Vec<bool>,
    version: Vec<u32>,
    /// Largest AABB extent; errors are reported relative to it
    scale: f64,
}

impl MeshSimplifier {
    pub fn new(vertices: &[Vertex], indices: &[u32]) -> Self {
        let positions: Vec<DVec3> = vertices.iter().map(|v| v.position().as_dvec3()).collect();
        let mut quadrics = vec![Quadric::zero(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];
        let mut faces = Vec::with_capacity(indices.len() / 3);
        let mut edge_uses: FxHashMap<(u32, u32), u32> = FxHashMap::default();

        for (face_idx, tri) in indices.chunks_exact(3).enumerate() {
            let face = [tri[0], tri[1], tri[2]];
            faces.push(face);

            for i in 0..3 {
                *edge_uses.entry(order_edge(face[i], face[(i + 1) % 3])).or_insert(0) += 1;
                vertex_faces[face[i] as usize].push(face_idx);
            }

            let p0 = positions[face[0] as usize];
            let p1 = positions[face[1] as usize];
            let p2 = positions[face[2] as usize];
            let normal = (p1 - p0).cross(p2 - p0).normalize_or_zero();
            let plane = normal.extend(-normal.dot(p0));
            let face_quadric = Quadric::from_plane(plane);

            for &v in &face {
                let q = &mut quadrics[v as usize];
                *q = q.add(&face_quadric);
            }
        }

        let mut locked = vec![false; positions.len()];
        for (&(a, b), &uses) in &edge_uses {
            if uses == 1 {
                locked[a as usize] = true;
                locked[b as usize] = true;
            }
        }

        let (min, max) = positions.iter().fold(
            (DVec3::splat(f64::MAX), DVec3::splat(f64::MIN)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );
        let extent = if positions.is_empty() { 0.0 } else { (max - min).max_element() };
        let scale = if extent > 0.0 { extent } else { 1.0 };

        let face_count = faces.len();
        let vertex_count = positions.len();
        Self {
            positions,
            quadrics,
            faces,
            face_alive: vec![true; face_count],
            vertex_faces,
            removed: vec![false; vertex_count],
            locked,
            version: vec![0; vertex_count],
            scale,
        }
    }

    /// Collapse edges until the index count reaches `target_index_count` or
    /// the next collapse would exceed `target_error`.
    pub fn simplify(mut self, target_index_count: usize, target_error: f32) -> Simplified {
        let mut live_indices = self.faces.len() * 3;
        if live_indices <= target_index_count {
            return Simplified {
                indices: self.faces.iter().flatten().copied().collect(),
                error: 0.0,
            };
        }

        let mut queue = BinaryHeap::new();
        let mut seen = FxHashSet::default();
        for face in &self.faces {
            for i in 0..3 {
                let edge = order_edge(face[i], face[(i + 1) % 3]);
                if seen.insert(edge) {
                    if let Some(candidate) = self.compute_collapse_candidate(edge.0, edge.1) {
                        queue.push(candidate);
                    }
                }
            }
        }

        let target_error = target_error as f64;
        let mut max_error = 0.0f64;

        while live_indices > target_index_count {
            let candidate = match queue.pop() {
                Some(c) => c,
                None => break,
            };
            let (from, to) = (candidate.from as usize, candidate.to as usize);

            // Skip if an endpoint moved since the candidate was queued
            if self.removed[from]
                || self.removed[to]
                || self.version[from] != candidate.from_version
                || self.version[to] != candidate.to_version
            {
                continue;
            }

            if candidate.error > target_error {
                break;
            }

            if self.collapse_flips_faces(candidate.from, candidate.to) {
                continue;
            }

            let dropped = self.collapse(candidate.from, candidate.to);
            live_indices -= dropped * 3;
            max_error = max_error.max(candidate.error);
            self.version[to] += 1;

            for neighbor in self.connected_vertices(candidate.to) {
                if let Some(c) = self.compute_collapse_candidate(candidate.to, neighbor) {
                    queue.push(c);
                }
            }
        }

        let indices = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, alive)| **alive)
            .flat_map(|(face, _)| face.iter().copied())
            .collect();

        Simplified {
            indices,
            error: max_error as f32,
        }
    }

    /// Pick the cheaper direction for collapsing edge `a`-`b`
    fn compute_collapse_candidate(&self, a: u32, b: u32) -> Option<CollapseCandidate> {
        let (ai, bi) = (a as usize, b as usize);
        let combined = self.quadrics[ai].add(&self.quadrics[bi]);

        let a_into_b = (!self.locked[ai]).then(|| combined.evaluate(self.positions[bi]));
        let b_into_a = (!self.locked[bi]).then(|| combined.evaluate(self.positions[ai]));

        let (from, to, raw) = match (a_into_b, b_into_a) {
            (Some(ab), Some(ba)) if ab <= ba => (a, b, ab),
            (Some(_), Some(ba)) => (b, a, ba),
            (Some(ab), None) => (a, b, ab),
            (None, Some(ba)) => (b, a, ba),
            (None, None) => return None,
        };

        Some(CollapseCandidate {
            from,
            to,
            error: raw.sqrt() / self.scale,
            from_version: self.version[from as usize],
            to_version: self.version[to as usize],
        })
    }

    /// True when moving `from` onto `to` would turn any surviving face over
    fn collapse_flips_faces(&self, from: u32, to: u32) -> bool {
        for &face_idx in &self.vertex_faces[from as usize] {
            if !self.face_alive[face_idx] {
                continue;
            }
            let face = self.faces[face_idx];
            if face.contains(&to) {
                continue;
            }

            let before = self.face_normal(face);
            let moved = face.map(|v| if v == from { to } else { v });
            let after = self.face_normal(moved);
            if before.length_squared() > 0.0 && before.dot(after) <= 0.0 {
                return true;
            }
        }
        false
    }

    fn face_normal(&self, face: [u32; 3]) -> DVec3 {
        let p0 = self.positions[face[0] as usize];
        let p1 = self.positions[face[1] as usize];
        let p2 = self.positions[face[2] as usize];
        (p1 - p0).cross(p2 - p0)
    }

    /// Returns the number of faces that became degenerate and were dropped
    fn collapse(&mut self, from: u32, to: u32) -> usize {
        let (fi, ti) = (from as usize, to as usize);
        self.removed[fi] = true;
        self.quadrics[ti] = self.quadrics[ti].add(&self.quadrics[fi]);

        let mut dropped = 0;
        for face_idx in std::mem::take(&mut self.vertex_faces[fi]) {
            if !self.face_alive[face_idx] {
                continue;
            }
            let face = &mut self.faces[face_idx];
            for v in face.iter_mut() {
                if *v == from {
                    *v = to;
                }
            }

            if face[0] == face[1] || face[1] == face[2] || face[2] == face[0] {
                self.face_alive[face_idx] = false;
                dropped += 1;
            } else {
                self.vertex_faces[ti].push(face_idx);
            }
        }
        dropped
    }

    /// Get vertices connected to given vertex through live faces
    fn connected_vertices(&self, vertex: u32) -> Vec<u32> {
        let mut connected: Vec<u32> = self.vertex_faces[vertex as usize]
            .iter()
            .filter(|&&f| self.face_alive[f])
            .flat_map(|&f| self.faces[f])
            .filter(|&v| v != vertex && !self.removed[v as usize])
            .collect();

        connected.sort_unstable();
        connected.dedup();
        connected
    }
}

/// Convenience wrapper for a one-shot simplification
pub fn simplify(vertices: &[Vertex], indices: &[u32], target_index_count: usize, target_error: f32) -> Simplified {
    MeshSimplifier::new(vertices, indices).simplify(target_index_count, target_error)
}

/// Order edge vertices consistently
fn order_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}
