//! Immutable chunk voxel snapshots used as meshing input.
#![forbid(unsafe_code)]

use voxmap_blocks::MaterialId;

/// Horizontal extent of a chunk column.
pub const CHUNK_WIDTH: usize = 16;
pub const CHUNK_DEPTH: usize = 16;

/// Inclusive vertical range of a snapshot, in absolute world Y.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct YBounds {
    pub min_y: i32,
    pub max_y: i32,
}

impl YBounds {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        assert!(max_y >= min_y, "empty vertical range {min_y}..={max_y}");
        Self { min_y, max_y }
    }

    #[inline]
    pub fn height(&self) -> usize {
        (self.max_y - self.min_y + 1) as usize
    }

    #[inline]
    pub fn contains(&self, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y
    }
}

/// Dense point-in-time copy of one chunk's materials over a vertical range.
/// Captured once by a voxel source and treated as read-only from then on;
/// the meshing call that requested it owns and discards it.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    bounds: YBounds,
    materials: Vec<MaterialId>,
}

impl ChunkSnapshot {
    /// Snapshot with every voxel set to `fill`.
    pub fn filled(bounds: YBounds, fill: MaterialId) -> Self {
        let len = CHUNK_WIDTH * CHUNK_DEPTH * bounds.height();
        Self {
            bounds,
            materials: vec![fill; len],
        }
    }

    pub fn all_air(bounds: YBounds) -> Self {
        Self::filled(bounds, MaterialId::AIR)
    }

    /// Wraps a pre-filled dense grid. Short vectors are padded with air so
    /// the index math stays total.
    pub fn from_materials(bounds: YBounds, materials: Vec<MaterialId>) -> Self {
        let expect = CHUNK_WIDTH * CHUNK_DEPTH * bounds.height();
        let mut m = materials;
        if m.len() != expect {
            m.resize(expect, MaterialId::AIR);
        }
        Self {
            bounds,
            materials: m,
        }
    }

    #[inline]
    pub fn bounds(&self) -> YBounds {
        self.bounds
    }

    #[inline]
    fn idx(&self, x: usize, y: i32, z: usize) -> usize {
        let ly = (y - self.bounds.min_y) as usize;
        (ly * CHUNK_DEPTH + z) * CHUNK_WIDTH + x
    }

    /// Material at `(x, y, z)`; `y` is absolute world Y within bounds.
    #[inline]
    pub fn get(&self, x: usize, y: i32, z: usize) -> MaterialId {
        self.materials[self.idx(x, y, z)]
    }

    /// Authoring-time write, used by voxel sources and tests while the
    /// snapshot is being captured.
    #[inline]
    pub fn set(&mut self, x: usize, y: i32, z: usize, m: MaterialId) {
        let i = self.idx(x, y, z);
        self.materials[i] = m;
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.materials.iter().any(|m| *m != MaterialId::AIR)
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        !self.has_non_air()
    }
}
