//! Live voxel world to map-client mesh service.
#![forbid(unsafe_code)]

pub mod config;
pub mod service;

pub use config::{ConfigError, VoxmapConfig};
pub use service::{MapService, ServiceError};

// Re-exports so embedders only need the facade crate.
pub use voxmap_blocks::{MaterialCatalog, MaterialId};
pub use voxmap_cache::{CacheStats, ChunkKey, MeshError, SnapshotTicket, VoxelSource};
pub use voxmap_chunk::{ChunkSnapshot, YBounds};
pub use voxmap_mesh::{AtlasIndex, ChunkMesh, Face, TextureAtlas, UvRect};

/// Initializes `env_logger` for embedding hosts and examples; safe to call
/// more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}
