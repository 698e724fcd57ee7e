//! LOD chain properties over the public mesh API

use swarm_renderer::mesh::remap;
use swarm_renderer::mesh::{LodMesh, LodSettings, MeshSource, Vertex};

/// Rolling height field of `n x n` quads, two triangles each
fn terrain(n: usize) -> MeshSource {
    let height = |x: usize, z: usize| {
        let (fx, fz) = (x as f32 / n as f32, z as f32 / n as f32);
        (fx * 9.0).sin() * (fz * 7.0).cos() * 0.15
    };
    let corner = |x: usize, z: usize| [x as f32 / n as f32 - 0.5, height(x, z), z as f32 / n as f32 - 0.5];

    let mut source = MeshSource::default();
    for z in 0..n {
        for x in 0..n {
            let quad = [corner(x, z), corner(x + 1, z), corner(x + 1, z + 1), corner(x, z + 1)];
            for tri in [[0, 2, 1], [0, 3, 2]] {
                for i in tri {
                    source.positions.push(quad[i]);
                    source.normals.push([0.0, 1.0, 0.0]);
                    source.tex_coords.push([quad[i][0] + 0.5, quad[i][2] + 0.5]);
                }
                source.face_materials.push(None);
            }
        }
    }
    source
}

fn assert_partition(mesh: &LodMesh) {
    let mut next = 0;
    for level in mesh.table.levels() {
        assert_eq!(level.index_offset, next, "levels must be packed back to back");
        next += level.index_count;
    }
    assert_eq!(next as usize, mesh.indices.len());
    assert_eq!(mesh.table.total_index_count() as usize, mesh.indices.len());
}

#[test]
fn cube_keeps_every_index_at_every_level() {
    let mesh = LodMesh::build(&MeshSource::cube(), &LodSettings::default());

    assert_eq!(mesh.vertices.len(), 8);
    assert_eq!(mesh.table.len(), 5);
    assert_eq!(mesh.table.level(0).index_count, 36);
    assert_partition(&mesh);

    for level in mesh.table.levels() {
        let range = level.index_range();
        let slice = &mesh.indices[range.start as usize..range.end as usize];
        assert!(slice.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }
    println!("✓ cube: {} packed indices over {} levels", mesh.indices.len(), mesh.table.len());
}

#[test]
fn terrain_chain_is_monotonic() {
    let mesh = LodMesh::build(&terrain(60), &LodSettings::default());
    assert_partition(&mesh);

    let counts: Vec<u32> = mesh.table.levels().iter().map(|l| l.index_count).collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "index counts grow: {:?}", counts);
    assert!(counts[0] > *counts.last().unwrap(), "nothing was simplified: {:?}", counts);
    assert!(counts.iter().all(|c| c % 3 == 0));

    let distances = mesh.table.max_distances();
    let last = distances.len() - 1;
    assert!(distances[..last].windows(2).all(|w| w[0] < w[1]));
    assert_eq!(distances[last], f32::MAX);

    assert_eq!(mesh.report.rows.len(), mesh.table.len() - 1);
    for row in &mesh.report.rows {
        assert_eq!(row.index_count as u32, mesh.table.level(row.level).index_count);
        assert!(row.index_count <= mesh.table.level(0).index_count as usize);
    }
}

#[test]
fn report_is_reproducible() {
    let source = terrain(40);
    let first = LodMesh::build(&source, &LodSettings::default());
    let second = LodMesh::build(&source, &LodSettings::default());
    assert_eq!(first.report, second.report);
    assert_eq!(first.indices, second.indices);
}

#[test]
fn far_instances_fall_into_coarsest_level() {
    let mesh = LodMesh::build(&terrain(20), &LodSettings::default());
    let coarsest = mesh.table.coarsest();
    for distance in [1.0e3, 1.0e9, f32::MAX, f32::INFINITY] {
        assert_eq!(mesh.table.select(distance), coarsest);
    }
    assert_eq!(mesh.table.select(0.0), 0);
}

#[test]
fn single_level_chain_is_the_base_mesh() {
    let settings = LodSettings {
        levels: 1,
        ..LodSettings::default()
    };
    let mesh = LodMesh::build(&terrain(10), &settings);
    assert_eq!(mesh.table.len(), 1);
    assert_eq!(mesh.table.level(0).index_count as usize, mesh.indices.len());
    assert!(mesh.report.rows.is_empty());
}

#[test]
fn empty_mesh_builds_empty_levels() {
    let mesh = LodMesh::build(&MeshSource::default(), &LodSettings::default());
    assert!(mesh.vertices.is_empty());
    assert!(mesh.indices.is_empty());
    assert_eq!(mesh.table.len(), 5);
    assert!(mesh.table.levels().iter().all(|l| l.index_count == 0));
}

#[test]
fn deduplication_is_idempotent() {
    let source = terrain(12);
    let corners: Vec<Vertex> = (0..source.corner_count())
        .map(|i| Vertex::new(source.positions[i], source.normals[i], source.tex_coords[i], [1.0; 3]))
        .collect();

    let (unique, _) = remap::deduplicate(&corners);
    assert!(unique.len() < corners.len());

    let (again, indices) = remap::deduplicate(&unique);
    assert_eq!(again, unique);
    assert_eq!(indices, (0..unique.len() as u32).collect::<Vec<_>>());
}
