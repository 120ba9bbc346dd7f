use std::sync::Arc;

use log::info;
use thiserror::Error;

use voxmap_blocks::{CatalogError, MaterialCatalog};
use voxmap_cache::{CacheInitError, CacheStats, ChunkKey, MeshCache, MeshError, VoxelSource};
use voxmap_mesh::{AtlasIndex, ChunkMesh, TextureAtlas};

use crate::config::{ConfigError, VoxmapConfig};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Cache(#[from] CacheInitError),
}

/// Top-level wiring: catalog + atlas + mesh cache behind the two surfaces
/// the outside world talks to, the read API for the transport layer and
/// the dirty-event ingestion API for edit/unload listeners.
pub struct MapService {
    config: VoxmapConfig,
    catalog: Arc<MaterialCatalog>,
    cache: MeshCache,
}

impl MapService {
    /// Builds a service over the given voxel source with the built-in
    /// material catalog and the default atlas layout.
    pub fn new(config: VoxmapConfig, source: Arc<dyn VoxelSource>) -> Result<Self, ServiceError> {
        let catalog = Arc::new(MaterialCatalog::builtin());
        let atlas = Arc::new(AtlasIndex::with_default_layout(catalog.clone()));
        Self::with_parts(config, catalog, atlas, source)
    }

    /// Builds a service from explicit parts, e.g. a catalog loaded from a
    /// custom TOML table or an atlas packed from a texture pack.
    pub fn with_parts(
        config: VoxmapConfig,
        catalog: Arc<MaterialCatalog>,
        atlas: Arc<dyn TextureAtlas>,
        source: Arc<dyn VoxelSource>,
    ) -> Result<Self, ServiceError> {
        // Configs built in code bypass the parse-time checks.
        config.validate()?;
        let cache_cfg = config.cache_config();
        info!(
            "voxmap service: {} materials, {} mesh workers, {} meshes/world",
            catalog.len(),
            cache_cfg.workers,
            cache_cfg.capacity_per_world
        );
        let cache = MeshCache::new(catalog.clone(), atlas, source, cache_cfg)?;
        Ok(Self {
            config,
            catalog,
            cache,
        })
    }

    /// Read API. Disabled worlds resolve to the empty sentinel without
    /// touching the cache or the voxel source. The transport layer is
    /// responsible for shifting local coordinates to world-absolute ones.
    pub fn get_or_build(
        &self,
        world: &str,
        cx: i32,
        cz: i32,
    ) -> Result<Arc<ChunkMesh>, MeshError> {
        if !self.config.is_world_enabled(world) {
            return Ok(Arc::new(ChunkMesh::empty()));
        }
        let key = ChunkKey::new(world, cx, cz);
        self.cache.get_or_build(&key, self.config.vertical_bounds())
    }

    /// Dirty-event ingestion: a block changed in this chunk.
    pub fn mark_dirty(&self, world: &str, cx: i32, cz: i32) {
        self.cache.mark_dirty(&ChunkKey::new(world, cx, cz));
    }

    /// Dirty-event ingestion: the chunk left residency.
    pub fn evict(&self, world: &str, cx: i32, cz: i32) {
        self.cache.evict(&ChunkKey::new(world, cx, cz));
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn catalog(&self) -> &Arc<MaterialCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &VoxmapConfig {
        &self.config
    }
}
