use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;

use voxmap_blocks::{MaterialCatalog, MaterialId};
use voxmap_cache::{CacheConfig, ChunkKey, MeshCache, MeshError, SnapshotTicket, VoxelSource};
use voxmap_chunk::{ChunkSnapshot, YBounds};
use voxmap_mesh::AtlasIndex;

/// In-memory voxel source: a sparse cell list per chunk, a residency switch
/// and a configurable capture delay.
struct FakeSource {
    cells: Mutex<HashMap<(String, i32, i32), Vec<(usize, i32, usize, MaterialId)>>>,
    fill: Mutex<Option<MaterialId>>,
    resident: AtomicBool,
    requests: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
            fill: Mutex::new(None),
            resident: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            ..Self::new()
        }
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Every voxel of every snapshot comes back as `m`.
    fn fill_with(&self, m: MaterialId) {
        *self.fill.lock().unwrap() = Some(m);
    }

    fn put(&self, key: &ChunkKey, x: usize, y: i32, z: usize, m: MaterialId) {
        self.cells
            .lock()
            .unwrap()
            .entry((key.world.clone(), key.cx, key.cz))
            .or_default()
            .push((x, y, z, m));
    }

    fn set_resident(&self, resident: bool) {
        self.resident.store(resident, Ordering::SeqCst);
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl VoxelSource for FakeSource {
    fn request_snapshot(&self, key: &ChunkKey, bounds: YBounds) -> SnapshotTicket {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = bounded(1);
        let mut snap = match *self.fill.lock().unwrap() {
            Some(m) => ChunkSnapshot::filled(bounds, m),
            None => ChunkSnapshot::all_air(bounds),
        };
        if let Some(cells) = self
            .cells
            .lock()
            .unwrap()
            .get(&(key.world.clone(), key.cx, key.cz))
        {
            for &(x, y, z, m) in cells {
                snap.set(x, y, z, m);
            }
        }
        let delay = *self.delay.lock().unwrap();
        if delay.is_zero() {
            let _ = tx.send(Some(snap));
        } else {
            thread::spawn(move || {
                thread::sleep(delay);
                let _ = tx.send(Some(snap));
            });
        }
        rx
    }

    fn is_resident(&self, _key: &ChunkKey) -> bool {
        self.resident.load(Ordering::SeqCst)
    }
}

const BOUNDS: YBounds = YBounds { min_y: 0, max_y: 15 };

fn stone() -> MaterialId {
    MaterialCatalog::builtin().get_id("stone").unwrap()
}

fn cache_with(source: Arc<FakeSource>, cfg: CacheConfig) -> MeshCache {
    let _ = env_logger::builder().is_test(true).try_init();
    let catalog = Arc::new(MaterialCatalog::builtin());
    let atlas = Arc::new(AtlasIndex::with_default_layout(catalog.clone()));
    MeshCache::new(catalog, atlas, source, cfg).unwrap()
}

fn test_config() -> CacheConfig {
    CacheConfig {
        workers: 2,
        capacity_per_world: 64,
        snapshot_timeout: Duration::from_secs(1),
        build_timeout: Duration::from_secs(5),
        debounce_window: Duration::from_millis(500),
        require_resident: true,
    }
}

#[test]
fn all_air_chunk_yields_empty_sentinel() {
    let source = Arc::new(FakeSource::new());
    let cache = cache_with(source, test_config());
    let key = ChunkKey::new("overworld", 0, 0);
    let mesh = cache.get_or_build(&key, BOUNDS).unwrap();
    assert!(mesh.is_empty());
    assert_eq!(mesh.emitter_count(), 0);
}

#[test]
fn clean_reads_are_idempotent_and_build_once() {
    let source = Arc::new(FakeSource::new());
    let key = ChunkKey::new("overworld", 3, -2);
    source.put(&key, 4, 4, 4, stone());
    let cache = cache_with(source.clone(), test_config());

    let a = cache.get_or_build(&key, BOUNDS).unwrap();
    let b = cache.get_or_build(&key, BOUNDS).unwrap();
    assert!(Arc::ptr_eq(&a, &b), "clean hit must not rebuild");
    assert_eq!(source.requests(), 1);
    assert_eq!(a.quad_count(), 6);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[test]
fn dirty_roundtrip_rebuilds_exactly_once() {
    let source = Arc::new(FakeSource::new());
    let key = ChunkKey::new("overworld", 0, 0);
    source.put(&key, 1, 1, 1, stone());
    let cache = cache_with(source.clone(), test_config());

    let first = cache.get_or_build(&key, BOUNDS).unwrap();
    assert_eq!(first.quad_count(), 6);

    // The world changed under us.
    source.put(&key, 1, 2, 1, stone());
    cache.mark_dirty(&key);
    cache.mark_dirty(&key); // idempotent

    let second = cache.get_or_build(&key, BOUNDS).unwrap();
    assert_eq!(source.requests(), 2, "one rebuild for the dirty entry");
    assert_eq!(second.quad_count(), 10, "two stacked cubes share one face");

    let third = cache.get_or_build(&key, BOUNDS).unwrap();
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(source.requests(), 2);
}

#[test]
fn evicted_key_behaves_like_first_request() {
    let source = Arc::new(FakeSource::new());
    let key = ChunkKey::new("overworld", 7, 7);
    source.put(&key, 0, 0, 0, stone());
    let cache = cache_with(source.clone(), test_config());

    cache.get_or_build(&key, BOUNDS).unwrap();
    cache.evict(&key);
    assert_eq!(cache.stats().entries, 0);

    cache.get_or_build(&key, BOUNDS).unwrap();
    assert_eq!(source.requests(), 2);
}

#[test]
fn unavailable_snapshot_serves_stale_then_retries() {
    let source = Arc::new(FakeSource::new());
    let key = ChunkKey::new("overworld", 1, 1);
    source.put(&key, 2, 2, 2, stone());
    let cache = cache_with(source.clone(), test_config());

    // Never built and not resident: empty sentinel, no snapshot request.
    source.set_resident(false);
    let mesh = cache.get_or_build(&key, BOUNDS).unwrap();
    assert!(mesh.is_empty());
    assert_eq!(source.requests(), 0);

    source.set_resident(true);
    let built = cache.get_or_build(&key, BOUNDS).unwrap();
    assert_eq!(built.quad_count(), 6);

    // Stale with the source gone: previous mesh is served, state unchanged.
    cache.mark_dirty(&key);
    source.set_resident(false);
    let stale = cache.get_or_build(&key, BOUNDS).unwrap();
    assert!(Arc::ptr_eq(&stale, &built));
    assert_eq!(source.requests(), 1);

    // Source back: the retry actually rebuilds.
    source.set_resident(true);
    cache.get_or_build(&key, BOUNDS).unwrap();
    assert_eq!(source.requests(), 2);
}

#[test]
fn concurrent_reads_share_a_single_build() {
    let source = Arc::new(FakeSource::with_delay(Duration::from_millis(150)));
    let key = ChunkKey::new("overworld", 5, 5);
    source.put(&key, 3, 3, 3, stone());
    let cache = Arc::new(cache_with(source.clone(), test_config()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let key = key.clone();
        handles.push(thread::spawn(move || cache.get_or_build(&key, BOUNDS)));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = results[0].as_ref().unwrap();
    for r in &results {
        assert_eq!(r.as_ref().unwrap().as_ref(), first.as_ref());
    }
    assert_eq!(source.requests(), 1, "single-flight invariant");
    assert_eq!(cache.stats().builds, 1);
}

#[test]
fn capacity_evicts_least_recently_accessed_clean_entry() {
    let source = Arc::new(FakeSource::new());
    let mut cfg = test_config();
    cfg.capacity_per_world = 3;
    let keys: Vec<ChunkKey> = (0..4).map(|i| ChunkKey::new("overworld", i, 0)).collect();
    for k in &keys {
        source.put(k, 0, 0, 0, stone());
    }
    let cache = cache_with(source.clone(), cfg);

    for k in &keys[..3] {
        cache.get_or_build(k, BOUNDS).unwrap();
    }
    // Refresh key 0 so key 1 is the least recently accessed.
    cache.get_or_build(&keys[0], BOUNDS).unwrap();
    cache.get_or_build(&keys[3], BOUNDS).unwrap();
    assert_eq!(cache.stats().entries, 3);

    let before = source.requests();
    cache.get_or_build(&keys[0], BOUNDS).unwrap();
    assert_eq!(source.requests(), before, "recently used entry survived");
    cache.get_or_build(&keys[1], BOUNDS).unwrap();
    assert_eq!(source.requests(), before + 1, "LRU entry was evicted");
}

#[test]
fn build_timeout_surfaces_error_and_clears_pending() {
    let source = Arc::new(FakeSource::new());
    source.fill_with(stone());
    let key = ChunkKey::new("overworld", 4, 4);
    let mut cfg = test_config();
    cfg.build_timeout = Duration::ZERO;
    let cache = cache_with(source.clone(), cfg);

    // A tall filled column cannot mesh inside a zero budget.
    let tall = YBounds { min_y: 0, max_y: 2047 };
    let err = cache.get_or_build(&key, tall).unwrap_err();
    assert_eq!(err, MeshError::BuildTimeout(Duration::ZERO));
    assert_eq!(cache.stats().entries, 0, "timed-out build stores nothing");

    // The pending marker is gone: the next read starts a fresh build
    // instead of waiting on one that already ended.
    let retry = cache.get_or_build(&key, tall);
    assert_eq!(source.requests(), 2);
    assert!(matches!(retry, Err(MeshError::BuildTimeout(_))));
}

#[test]
fn capacity_pressure_never_evicts_a_pending_rebuild() {
    let source = Arc::new(FakeSource::new());
    let a = ChunkKey::new("overworld", 0, 0);
    let b = ChunkKey::new("overworld", 1, 0);
    source.put(&a, 0, 0, 0, stone());
    source.put(&b, 0, 0, 0, stone());
    let mut cfg = test_config();
    cfg.capacity_per_world = 1;
    let cache = Arc::new(cache_with(source.clone(), cfg));

    cache.get_or_build(&a, BOUNDS).unwrap();
    cache.mark_dirty(&a);
    source.set_delay(Duration::from_millis(150));
    let rebuild = {
        let cache = cache.clone();
        let a = a.clone();
        thread::spawn(move || cache.get_or_build(&a, BOUNDS))
    };
    // Let the rebuild claim its pending slot before applying pressure.
    thread::sleep(Duration::from_millis(30));
    source.set_delay(Duration::ZERO);
    cache.get_or_build(&b, BOUNDS).unwrap();

    let mesh = rebuild.join().unwrap().unwrap();
    assert_eq!(mesh.quad_count(), 6);

    // The overflowed shard sacrificed b, not the in-flight rebuild.
    let before = source.requests();
    let again = cache.get_or_build(&a, BOUNDS).unwrap();
    assert!(Arc::ptr_eq(&mesh, &again));
    assert_eq!(source.requests(), before);
    cache.get_or_build(&b, BOUNDS).unwrap();
    assert_eq!(source.requests(), before + 1);
}

#[test]
fn overflow_keeps_the_entry_just_stored() {
    let source = Arc::new(FakeSource::new());
    let a = ChunkKey::new("overworld", 0, 0);
    let b = ChunkKey::new("overworld", 1, 0);
    source.put(&a, 0, 0, 0, stone());
    source.put(&b, 0, 0, 0, stone());
    let mut cfg = test_config();
    cfg.capacity_per_world = 1;
    let cache = cache_with(source.clone(), cfg);

    cache.get_or_build(&a, BOUNDS).unwrap();
    let b_mesh = cache.get_or_build(&b, BOUNDS).unwrap();
    assert_eq!(cache.stats().entries, 1);

    let again = cache.get_or_build(&b, BOUNDS).unwrap();
    assert!(
        Arc::ptr_eq(&b_mesh, &again),
        "just-stored entry is never the victim"
    );
    assert_eq!(source.requests(), 2);
}

#[test]
fn worlds_are_independent_namespaces() {
    let source = Arc::new(FakeSource::new());
    let a = ChunkKey::new("overworld", 2, 2);
    let b = ChunkKey::new("nether", 2, 2);
    source.put(&a, 0, 0, 0, stone());
    let cache = cache_with(source.clone(), test_config());

    let mesh_a = cache.get_or_build(&a, BOUNDS).unwrap();
    let mesh_b = cache.get_or_build(&b, BOUNDS).unwrap();
    assert_eq!(mesh_a.quad_count(), 6);
    assert!(mesh_b.is_empty());
    assert_eq!(cache.stats().entries, 2);
    assert_eq!(source.requests(), 2);
}

#[test]
fn settled_dirty_entry_is_dropped_after_quiet_window() {
    let source = Arc::new(FakeSource::new());
    let key = ChunkKey::new("overworld", 9, 9);
    source.put(&key, 0, 0, 0, stone());
    let mut cfg = test_config();
    cfg.debounce_window = Duration::from_millis(50);
    let cache = cache_with(source.clone(), cfg);

    cache.get_or_build(&key, BOUNDS).unwrap();
    cache.mark_dirty(&key);
    assert_eq!(cache.stats().entries, 1, "mark_dirty never evicts directly");

    thread::sleep(Duration::from_millis(250));
    assert_eq!(cache.stats().entries, 0, "janitor dropped the settled entry");

    cache.get_or_build(&key, BOUNDS).unwrap();
    assert_eq!(source.requests(), 2);
}
