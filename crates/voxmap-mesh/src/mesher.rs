use log::trace;
use voxmap_blocks::{MaterialCatalog, TintCategory};
use voxmap_chunk::{CHUNK_DEPTH, CHUNK_WIDTH, ChunkSnapshot};

use crate::atlas::TextureAtlas;
use crate::face::Face;
use crate::mesh::{ChunkMesh, MeshBuild};

/// Builds the exposed-face mesh for one chunk snapshot.
///
/// Pure and deterministic: identical snapshot, catalog and atlas state yield
/// byte-identical output. Voxels are visited y ascending, then z, then x;
/// faces per voxel in [`Face::EMIT_ORDER`]. A face is exposed when its
/// neighbor lies outside the snapshot (vertical bound or chunk edge) or does
/// not occlude. Emitter samples are recorded before the renderability check,
/// so a culled or non-cube emitter still contributes its light.
pub fn mesh_chunk(
    snap: &ChunkSnapshot,
    catalog: &MaterialCatalog,
    atlas: &dyn TextureAtlas,
) -> ChunkMesh {
    let bounds = snap.bounds();
    let mut build = MeshBuild::default();

    // Neighbor visibility test; out-of-snapshot positions never occlude.
    let occludes = |x: i32, y: i32, z: i32| -> bool {
        if !bounds.contains(y) {
            return false;
        }
        if x < 0 || x >= CHUNK_WIDTH as i32 || z < 0 || z >= CHUNK_DEPTH as i32 {
            return false;
        }
        catalog.flags(snap.get(x as usize, y, z as usize)).occludes()
    };

    for y in bounds.min_y..=bounds.max_y {
        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let m = snap.get(x, y, z);
                let flags = catalog.flags(m);
                if flags.air {
                    continue;
                }

                if let Some(intensity) = flags.emitter {
                    build.push_emitter(x as i32, y, z as i32, intensity);
                }

                if !flags.is_renderable() {
                    continue;
                }

                let rgb = flags.tint.rgb();
                let (xi, zi) = (x as i32, z as i32);
                for face in Face::EMIT_ORDER {
                    let (dx, dy, dz) = face.delta();
                    if occludes(xi + dx, y + dy, zi + dz) {
                        continue;
                    }
                    // Grass block: only the top face gets the grass tint.
                    let face_rgb = if face == Face::Up && flags.grass_top {
                        TintCategory::GrassPlant.rgb()
                    } else {
                        rgb
                    };
                    build.push_face(face, xi, y, zi, atlas.uv_for(m, face), face_rgb);
                }
            }
        }
    }

    trace!(
        "meshed chunk [{}..={}]: {} quads",
        bounds.min_y,
        bounds.max_y,
        build.quad_count()
    );
    build.into_mesh()
}
