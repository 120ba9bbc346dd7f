use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use voxmap_blocks::{MaterialCatalog, MaterialId};

use crate::face::{Face, FaceRole};

/// Normalized atlas rectangle, all values in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// Tile lookup consumed by the mesher. Total by contract: unknown
/// `(material, face)` pairs resolve through aliases to a fallback tile, so
/// the mesher never special-cases atlas misses.
pub trait TextureAtlas: Send + Sync {
    fn uv_for(&self, material: MaterialId, face: Face) -> UvRect;
}

/// Tile index over a packed grid atlas. Only the lookup side lives here;
/// decoding and packing the source images is the atlas builder's job.
pub struct AtlasIndex {
    catalog: Arc<MaterialCatalog>,
    tiles_per_row: usize,
    key_to_index: HashMap<String, usize>,
    tile_count: usize,
    aliases: HashMap<String, String>,
    face_overrides: HashMap<(MaterialId, FaceRole), String>,
    fallback: String,
}

impl AtlasIndex {
    pub fn new(catalog: Arc<MaterialCatalog>, tiles_per_row: usize) -> Self {
        Self {
            catalog,
            tiles_per_row: tiles_per_row.max(1),
            key_to_index: HashMap::new(),
            tile_count: 0,
            aliases: HashMap::new(),
            face_overrides: HashMap::new(),
            fallback: String::new(),
        }
    }

    /// Layout mirroring the default texture pack: one tile per catalog
    /// material plus the handful of per-face variants (grass top/side,
    /// fluid still/flow).
    pub fn with_default_layout(catalog: Arc<MaterialCatalog>) -> Self {
        let mut atlas = Self::new(catalog.clone(), 16);
        for m in catalog.materials.iter().skip(1) {
            atlas.insert_tile(&m.key);
        }
        for extra in [
            "grass_block_top",
            "grass_block_side",
            "water_still",
            "water_flow",
            "lava_still",
            "lava_flow",
        ] {
            atlas.insert_tile(extra);
        }
        atlas.set_fallback("stone");
        if let Some(grass) = catalog.get_id("grass_block") {
            atlas.face_override(grass, FaceRole::Top, "grass_block_top");
            atlas.face_override(grass, FaceRole::Bottom, "dirt");
            atlas.face_override(grass, FaceRole::Side, "grass_block_side");
        }
        for (key, still, flow) in [("water", "water_still", "water_flow"), ("lava", "lava_still", "lava_flow")] {
            if let Some(id) = catalog.get_id(key) {
                atlas.face_override(id, FaceRole::Top, still);
                atlas.face_override(id, FaceRole::Bottom, still);
                atlas.face_override(id, FaceRole::Side, flow);
            }
        }
        atlas
    }

    /// Registers the next packed tile under `key`, returning its index.
    pub fn insert_tile(&mut self, key: &str) -> usize {
        if let Some(&i) = self.key_to_index.get(key) {
            return i;
        }
        let idx = self.tile_count;
        self.tile_count += 1;
        self.key_to_index.insert(key.to_string(), idx);
        idx
    }

    pub fn alias(&mut self, from: &str, to: &str) {
        self.aliases.insert(from.to_string(), to.to_string());
    }

    pub fn face_override(&mut self, material: MaterialId, role: FaceRole, tile_key: &str) {
        self.face_overrides
            .insert((material, role), tile_key.to_string());
    }

    pub fn set_fallback(&mut self, key: &str) {
        self.fallback = key.to_string();
    }

    fn resolve(&self, key: &str) -> usize {
        if let Some(&i) = self.key_to_index.get(key) {
            return i;
        }
        if let Some(alias) = self.aliases.get(key) {
            if let Some(&i) = self.key_to_index.get(alias) {
                return i;
            }
        }
        debug!("atlas: no tile for '{key}', using fallback");
        self.key_to_index.get(&self.fallback).copied().unwrap_or(0)
    }

    fn rect_for_index(&self, idx: usize) -> UvRect {
        let cols = self.tiles_per_row;
        let rows = (self.tile_count.max(1) + cols - 1) / cols;
        let x = idx % cols;
        let y = idx / cols;
        UvRect {
            u0: x as f32 / cols as f32,
            v0: y as f32 / rows as f32,
            u1: (x + 1) as f32 / cols as f32,
            v1: (y + 1) as f32 / rows as f32,
        }
    }
}

impl TextureAtlas for AtlasIndex {
    fn uv_for(&self, material: MaterialId, face: Face) -> UvRect {
        let idx = match self.face_overrides.get(&(material, face.role())) {
            Some(k) => self.resolve(k),
            None => {
                // Packs may ship per-face variants under a role suffix,
                // e.g. "grass_block_top"; fall back to the base key.
                let base = self.catalog.key(material).unwrap_or("");
                let suffixed = format!("{base}_{}", face.role().suffix());
                match self.key_to_index.get(&suffixed) {
                    Some(&i) => i,
                    None => self.resolve(base),
                }
            }
        };
        self.rect_for_index(idx)
    }
}
