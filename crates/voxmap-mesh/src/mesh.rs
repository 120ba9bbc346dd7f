use crate::atlas::UvRect;
use crate::face::Face;

/// Immutable meshing output for one chunk, in the map client's wire layout:
/// flat arrays, local X/Z with absolute Y, one flat RGB color per vertex,
/// `u32` triangle indices and `[x, y, z, intensity]` emitter groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub colors: Vec<f32>,
    pub indices: Vec<u32>,
    pub emitters: Vec<f32>,
}

impl ChunkMesh {
    /// Canonical "no geometry" sentinel; distinct from a build error.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.vertex_count() / 4
    }

    #[inline]
    pub fn emitter_count(&self) -> usize {
        self.emitters.len() / 4
    }
}

/// Accumulator the mesher appends quads and emitter samples into.
#[derive(Default, Clone)]
pub struct MeshBuild {
    pos: Vec<f32>,
    norm: Vec<f32>,
    uv: Vec<f32>,
    col: Vec<f32>,
    idx: Vec<u32>,
    emitters: Vec<f32>,
}

impl MeshBuild {
    /// Pre-reserve capacity for approximately `n_quads` quads worth of data.
    pub fn reserve_quads(&mut self, n_quads: usize) {
        // 4 vertices per quad
        self.pos.reserve(n_quads * 4 * 3);
        self.norm.reserve(n_quads * 4 * 3);
        self.uv.reserve(n_quads * 4 * 2);
        self.col.reserve(n_quads * 4 * 3);
        self.idx.reserve(n_quads * 6);
    }

    /// Appends one unit-cube face at voxel `(x, y, z)` as a quad of two
    /// CCW-wound triangles, with a constant normal and a flat color.
    pub fn push_face(&mut self, face: Face, x: i32, y: i32, z: i32, r: UvRect, rgb: [f32; 3]) {
        let (x0, y0, z0) = (x as f32, y as f32, z as f32);
        let (x1, y1, z1) = (x0 + 1.0, y0 + 1.0, z0 + 1.0);
        let corners: [[f32; 3]; 4] = match face {
            Face::West => [[x0, y0, z0], [x0, y1, z0], [x0, y1, z1], [x0, y0, z1]],
            Face::East => [[x1, y0, z1], [x1, y1, z1], [x1, y1, z0], [x1, y0, z0]],
            Face::North => [[x1, y0, z0], [x1, y1, z0], [x0, y1, z0], [x0, y0, z0]],
            Face::South => [[x0, y0, z1], [x0, y1, z1], [x1, y1, z1], [x1, y0, z1]],
            Face::Down => [[x0, y0, z1], [x1, y0, z1], [x1, y0, z0], [x0, y0, z0]],
            Face::Up => [[x0, y1, z0], [x1, y1, z0], [x1, y1, z1], [x0, y1, z1]],
        };
        let base = (self.pos.len() / 3) as u32;
        let n = face.normal();
        for c in corners {
            self.pos.extend_from_slice(&c);
            self.norm.extend_from_slice(&n);
            self.col.extend_from_slice(&rgb);
        }
        self.uv
            .extend_from_slice(&[r.u0, r.v1, r.u0, r.v0, r.u1, r.v0, r.u1, r.v1]);
        self.idx
            .extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    }

    /// Records a point-light sample at the voxel's horizontal center, near
    /// the top of the cell.
    pub fn push_emitter(&mut self, x: i32, y: i32, z: i32, intensity: f32) {
        self.emitters.extend_from_slice(&[
            x as f32 + 0.5,
            y as f32 + 0.7,
            z as f32 + 0.5,
            intensity,
        ]);
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.pos.len() / 12
    }

    pub fn into_mesh(self) -> ChunkMesh {
        ChunkMesh {
            positions: self.pos,
            normals: self.norm,
            uvs: self.uv,
            colors: self.col,
            indices: self.idx,
            emitters: self.emitters,
        }
    }
}
