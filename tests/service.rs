use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::bounded;

use voxmap::{
    ChunkKey, ChunkSnapshot, ConfigError, MapService, MaterialCatalog, ServiceError,
    SnapshotTicket, VoxelSource, VoxmapConfig, YBounds,
};

/// Source serving one stone column in chunk (0,0) of "overworld".
struct OneBlockSource {
    requests: AtomicUsize,
}

impl OneBlockSource {
    fn new() -> Self {
        Self {
            requests: AtomicUsize::new(0),
        }
    }
}

impl VoxelSource for OneBlockSource {
    fn request_snapshot(&self, key: &ChunkKey, bounds: YBounds) -> SnapshotTicket {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = bounded(1);
        let mut snap = ChunkSnapshot::all_air(bounds);
        if key.world == "overworld" && key.cx == 0 && key.cz == 0 {
            let stone = MaterialCatalog::builtin().get_id("stone").unwrap();
            snap.set(8, bounds.min_y, 8, stone);
        }
        let _ = tx.send(Some(snap));
        rx
    }

    fn is_resident(&self, _key: &ChunkKey) -> bool {
        true
    }
}

fn service(config_toml: &str) -> (MapService, Arc<OneBlockSource>) {
    voxmap::init_logging();
    let source = Arc::new(OneBlockSource::new());
    let config = VoxmapConfig::from_toml_str(config_toml).unwrap();
    let service = MapService::new(config, source.clone()).unwrap();
    (service, source)
}

#[test]
fn meshes_enabled_world_through_the_facade() {
    let (service, source) = service("");
    let mesh = service.get_or_build("overworld", 0, 0).unwrap();
    assert_eq!(mesh.quad_count(), 6);
    assert_eq!(source.requests.load(Ordering::SeqCst), 1);

    // Clean hit on the second read.
    let again = service.get_or_build("overworld", 0, 0).unwrap();
    assert!(Arc::ptr_eq(&mesh, &again));
    assert_eq!(service.stats().hits, 1);
}

#[test]
fn disabled_world_short_circuits_to_empty() {
    let (service, source) = service(
        r#"
        [worlds.overworld]
        enabled = false
    "#,
    );
    let mesh = service.get_or_build("overworld", 0, 0).unwrap();
    assert!(mesh.is_empty());
    assert_eq!(source.requests.load(Ordering::SeqCst), 0);
    assert_eq!(service.stats().entries, 0);
}

#[test]
fn hand_built_config_with_inverted_range_is_rejected() {
    let source = Arc::new(OneBlockSource::new());
    let mut config = VoxmapConfig::from_toml_str("").unwrap();
    config.render.min_y = 10;
    config.render.max_y = -10;
    let err = MapService::new(config, source);
    assert!(matches!(
        err,
        Err(ServiceError::Config(ConfigError::EmptyVerticalRange))
    ));
}

#[test]
fn dirty_and_evict_flow_through_ingestion_api() {
    let (service, source) = service("");
    service.get_or_build("overworld", 0, 0).unwrap();

    service.mark_dirty("overworld", 0, 0);
    service.get_or_build("overworld", 0, 0).unwrap();
    assert_eq!(source.requests.load(Ordering::SeqCst), 2);

    service.evict("overworld", 0, 0);
    assert_eq!(service.stats().entries, 0);
    service.get_or_build("overworld", 0, 0).unwrap();
    assert_eq!(source.requests.load(Ordering::SeqCst), 3);
}
