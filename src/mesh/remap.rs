use rustc_hash::FxHashMap;

use super::vertex::Vertex;

/// Collapse identical corners into unique vertices.
///
/// Returns the unique vertices in first-seen order and one index per input
/// corner pointing at its unique slot.
pub fn deduplicate(corners: &[Vertex]) -> (Vec<Vertex>, Vec<u32>) {
    let mut unique: FxHashMap<Vertex, u32> = FxHashMap::default();
    unique.reserve(corners.len());

    let mut vertices = Vec::new();
    let mut indices = Vec::with_capacity(corners.len());

    for corner in corners {
        let slot = *unique.entry(*corner).or_insert_with(|| {
            vertices.push(*corner);
            (vertices.len() - 1) as u32
        });
        indices.push(slot);
    }

    (vertices, indices)
}

/// Reorder vertices by first use in the index buffer.
///
/// Vertices the index buffer never touches are dropped. Indices are rewritten
/// in place; the returned buffer replaces `vertices`.
pub fn optimize_vertex_fetch(vertices: &[Vertex], indices: &mut [u32]) -> Vec<Vertex> {
    const UNASSIGNED: u32 = u32::MAX;
    let mut remap = vec![UNASSIGNED; vertices.len()];
    let mut ordered = Vec::with_capacity(vertices.len());

    for index in indices.iter_mut() {
        let old = *index as usize;
        if remap[old] == UNASSIGNED {
            remap[old] = ordered.len() as u32;
            ordered.push(vertices[old]);
        }
        *index = remap[old];
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32) -> Vertex {
        Vertex::new([x, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0], [1.0; 3])
    }

    #[test]
    fn shared_corners_collapse() {
        let corners = [v(0.0), v(1.0), v(2.0), v(2.0), v(1.0), v(3.0)];
        let (vertices, indices) = deduplicate(&corners);
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn fetch_order_follows_first_use() {
        let vertices = [v(0.0), v(1.0), v(2.0), v(3.0)];
        let mut indices = vec![3, 1, 0, 3, 0, 1];
        let ordered = optimize_vertex_fetch(&vertices, &mut indices);

        // vertex 2 is never referenced
        assert_eq!(ordered.len(), 3);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 1]);
        assert_eq!(ordered[0], v(3.0));
        assert_eq!(ordered[1], v(1.0));
        assert_eq!(ordered[2], v(0.0));
    }
}
