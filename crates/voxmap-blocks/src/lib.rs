//! Material catalog and voxel classification.
#![forbid(unsafe_code)]

pub mod catalog;
pub mod types;

pub use catalog::{CatalogError, MaterialCatalog};
pub use types::{CutoutKind, MaterialFlags, MaterialId, TintCategory};
