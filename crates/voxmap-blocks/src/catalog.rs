use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::types::{CutoutKind, MaterialFlags, MaterialId, TintCategory};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("material '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct Material {
    pub id: MaterialId,
    pub key: String,
    pub flags: MaterialFlags,
}

/// Classification table keyed by stable material id, built once at startup.
/// Replaces ad-hoc name matching: every predicate the mesher needs is a
/// field compiled from the TOML definition.
#[derive(Default, Clone, Debug)]
pub struct MaterialCatalog {
    pub materials: Vec<Material>,
    pub by_key: HashMap<String, MaterialId>,
}

impl MaterialCatalog {
    /// Empty catalog holding only the reserved air sentinel at id 0.
    pub fn new() -> Self {
        let mut catalog = Self {
            materials: Vec::new(),
            by_key: HashMap::new(),
        };
        catalog.materials.push(Material {
            id: MaterialId::AIR,
            key: String::new(),
            flags: MaterialFlags::AIR,
        });
        catalog
    }

    /// Catalog compiled from the table shipped in `assets/materials.toml`.
    pub fn builtin() -> Self {
        // The shipped table must always compile; a broken asset is a bug.
        Self::from_toml_str(include_str!("../../../assets/materials.toml"))
            .unwrap_or_else(|e| panic!("builtin materials.toml invalid: {e}"))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, CatalogError> {
        let cfg: MaterialsConfig = toml::from_str(toml_str)?;
        let mut catalog = MaterialCatalog::new();
        let mut entries: Vec<(String, MaterialDef)> = cfg.materials.into_iter().collect();
        // HashMap iteration order is nondeterministic; sort keys so MaterialId
        // assignment is stable across runs.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, def) in entries {
            let flags = compile_flags(&key, &def)?;
            let id = MaterialId(catalog.materials.len() as u16);
            catalog.by_key.insert(key.clone(), id);
            catalog.materials.push(Material { id, key, flags });
        }
        Ok(catalog)
    }

    pub fn get_id(&self, key: &str) -> Option<MaterialId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Total classification lookup: ids outside the catalog read as air.
    #[inline]
    pub fn flags(&self, id: MaterialId) -> MaterialFlags {
        self.get(id).map(|m| m.flags).unwrap_or(MaterialFlags::AIR)
    }

    pub fn key(&self, id: MaterialId) -> Option<&str> {
        self.get(id).map(|m| m.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        // The air sentinel is always present.
        self.materials.len() <= 1
    }
}

fn compile_flags(key: &str, def: &MaterialDef) -> Result<MaterialFlags, CatalogError> {
    let cutout = match def.cutout.as_deref() {
        None => None,
        Some("leaves") => Some(CutoutKind::Leaves),
        Some("water") => Some(CutoutKind::Water),
        Some("lava") => Some(CutoutKind::Lava),
        Some(other) => {
            return Err(CatalogError::Invalid {
                key: key.to_string(),
                reason: format!("unknown cutout kind '{other}'"),
            });
        }
    };
    let tint = match def.tint.as_deref() {
        None | Some("none") => TintCategory::None,
        Some("grass") => TintCategory::GrassPlant,
        Some("foliage") => TintCategory::Foliage,
        Some("water") => TintCategory::Water,
        Some("lava") => TintCategory::Lava,
        Some(other) => {
            return Err(CatalogError::Invalid {
                key: key.to_string(),
                reason: format!("unknown tint '{other}'"),
            });
        }
    };
    if def.air && (cutout.is_some() || def.emitter.is_some()) {
        return Err(CatalogError::Invalid {
            key: key.to_string(),
            reason: "air materials cannot be cutouts or emitters".to_string(),
        });
    }
    let solid = def.solid.unwrap_or(!def.air && cutout.is_none());
    Ok(MaterialFlags {
        air: def.air,
        solid,
        occluder: def.occluder.unwrap_or(solid && cutout.is_none()),
        cutout,
        render_allow: def.render_allow,
        tint,
        grass_top: def.grass_top,
        emitter: def.emitter,
    })
}

// --- Config ---

#[derive(Deserialize)]
pub struct MaterialsConfig {
    pub materials: HashMap<String, MaterialDef>,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaterialDef {
    pub air: bool,
    pub solid: Option<bool>,
    pub occluder: Option<bool>,
    /// "leaves" | "water" | "lava"
    pub cutout: Option<String>,
    /// Transparent cubes rendered despite not occluding (glass, ice).
    pub render_allow: bool,
    /// "none" | "grass" | "foliage" | "water" | "lava"
    pub tint: Option<String>,
    pub grass_top: bool,
    /// Point-light intensity for the map client, if the block emits.
    pub emitter: Option<f32>,
}
