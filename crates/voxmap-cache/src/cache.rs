use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select};
use hashbrown::HashMap;
use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

use voxmap_blocks::MaterialCatalog;
use voxmap_chunk::YBounds;
use voxmap_mesh::{ChunkMesh, TextureAtlas, mesh_chunk};

use crate::key::ChunkKey;
use crate::source::VoxelSource;

#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Mesh worker pool size; sized to leave headroom for the host.
    pub workers: usize,
    /// Maximum cached meshes per world namespace.
    pub capacity_per_world: usize,
    /// Bound on the snapshot round-trip to the voxel source.
    pub snapshot_timeout: Duration,
    /// Bound on one mesh build on the worker pool.
    pub build_timeout: Duration,
    /// Quiet window collapsing bursts of dirty events per key.
    pub debounce_window: Duration,
    /// Consult `VoxelSource::is_resident` before requesting a snapshot.
    pub require_resident: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(8);
        Self {
            workers: (cores / 2).max(1),
            capacity_per_world: 1024,
            snapshot_timeout: Duration::from_secs(2),
            build_timeout: Duration::from_secs(12),
            debounce_window: Duration::from_millis(500),
            require_resident: true,
        }
    }
}

/// Failures surfaced to the read caller. Snapshot unavailability is not an
/// error; it resolves to the previous mesh or the empty sentinel.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("mesh build exceeded {0:?}")]
    BuildTimeout(Duration),
    #[error("mesh build failed: {0}")]
    BuildFailed(String),
}

#[derive(Debug, Error)]
pub enum CacheInitError {
    #[error("failed to build mesh worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub evictions: u64,
    pub entries: usize,
}

type BuildResult = Result<Arc<ChunkMesh>, MeshError>;

struct Entry {
    mesh: Arc<ChunkMesh>,
    dirty: bool,
}

struct PendingBuild {
    waiters: Vec<Sender<BuildResult>>,
    /// Set by `evict` while the build is in flight: the result is still
    /// delivered to waiters but never stored.
    discarded: bool,
    /// Set by `mark_dirty` while the build is in flight, so the stored
    /// result comes out already stale instead of losing the edit.
    dirtied: bool,
}

#[derive(Default)]
struct WorldShard {
    entries: HashMap<(i32, i32), Entry>,
    /// Recency order, least-recently-accessed at the front.
    order: VecDeque<(i32, i32)>,
    pending: HashMap<(i32, i32), PendingBuild>,
}

impl WorldShard {
    fn touch(&mut self, ck: (i32, i32)) {
        if let Some(pos) = self.order.iter().position(|c| *c == ck) {
            self.order.remove(pos);
        }
        self.order.push_back(ck);
    }

    fn remove(&mut self, ck: (i32, i32)) -> bool {
        if let Some(pos) = self.order.iter().position(|c| *c == ck) {
            self.order.remove(pos);
        }
        self.entries.remove(&ck).is_some()
    }

    /// Evicts least-recently-accessed entries until `cap` holds. Clean
    /// entries go first; keys with a pending build and the entry at the
    /// back of the order (the one just stored or touched) are never
    /// victims, so the count may transiently overshoot `cap`.
    fn enforce_capacity(&mut self, cap: usize) -> u64 {
        let mut evicted = 0u64;
        while self.entries.len() > cap {
            let newest = self.order.back().copied();
            let victim = self
                .order
                .iter()
                .copied()
                .find(|ck| {
                    Some(*ck) != newest
                        && !self.pending.contains_key(ck)
                        && self.entries.get(ck).is_some_and(|e| !e.dirty)
                })
                .or_else(|| {
                    self.order.iter().copied().find(|ck| {
                        Some(*ck) != newest
                            && !self.pending.contains_key(ck)
                            && self.entries.contains_key(ck)
                    })
                });
            match victim {
                Some(ck) => {
                    self.remove(ck);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

struct CacheInner {
    catalog: Arc<MaterialCatalog>,
    atlas: Arc<dyn TextureAtlas>,
    source: Arc<dyn VoxelSource>,
    cfg: CacheConfig,
    worlds: RwLock<HashMap<String, Arc<Mutex<WorldShard>>>>,
    /// Per-key quiet-window deadline, refreshed on every dirty event.
    debounce: Mutex<HashMap<ChunkKey, Instant>>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    evictions: AtomicU64,
}

impl CacheInner {
    fn shard(&self, world: &str) -> Arc<Mutex<WorldShard>> {
        if let Some(s) = self.worlds.read().expect("worlds lock").get(world) {
            return s.clone();
        }
        let mut map = self.worlds.write().expect("worlds lock");
        map.entry(world.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(WorldShard::default())))
            .clone()
    }

    /// Drops stored meshes whose dirty quiet-window elapsed with no further
    /// edits. Burst-safe: a refreshed deadline postpones the drop.
    fn debounce_pass(&self) {
        let now = Instant::now();
        let settled: Vec<ChunkKey> = {
            let mut map = self.debounce.lock().expect("debounce lock");
            let ready: Vec<ChunkKey> = map
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(k, _)| k.clone())
                .collect();
            for k in &ready {
                map.remove(k);
            }
            ready
        };
        for key in settled {
            let shard = self.shard(&key.world);
            let mut s = shard.lock().expect("shard lock");
            let ck = key.coord();
            if s.pending.contains_key(&ck) {
                continue;
            }
            if s.entries.get(&ck).is_some_and(|e| e.dirty) && s.remove(ck) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("dirty chunk {key} settled, dropped stale mesh");
            }
        }
    }

    fn entry_count(&self) -> usize {
        let worlds = self.worlds.read().expect("worlds lock");
        worlds
            .values()
            .map(|s| s.lock().expect("shard lock").entries.len())
            .sum()
    }
}

enum Role {
    Wait(Receiver<BuildResult>),
    Build { stale: Option<Arc<ChunkMesh>> },
}

/// Keyed store of built chunk meshes with dirty tracking, per-world LRU
/// capacity, debounced invalidation and single-flight concurrent rebuilds.
///
/// Per-key state lives behind a per-world mutex that is never held across
/// the snapshot round-trip or a mesh build.
pub struct MeshCache {
    inner: Arc<CacheInner>,
    pool: Arc<ThreadPool>,
    janitor_stop: Sender<()>,
    janitor: Option<JoinHandle<()>>,
}

impl MeshCache {
    pub fn new(
        catalog: Arc<MaterialCatalog>,
        atlas: Arc<dyn TextureAtlas>,
        source: Arc<dyn VoxelSource>,
        cfg: CacheConfig,
    ) -> Result<Self, CacheInitError> {
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(cfg.workers.max(1))
                .thread_name(|i| format!("voxmap-mesher-{i}"))
                .build()?,
        );
        let tick = (cfg.debounce_window / 4).max(Duration::from_millis(25));
        let inner = Arc::new(CacheInner {
            catalog,
            atlas,
            source,
            cfg,
            worlds: RwLock::new(HashMap::new()),
            debounce: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        });
        let (janitor_stop, stop_rx) = bounded::<()>(1);
        let janitor_inner = inner.clone();
        let janitor = thread::Builder::new()
            .name("voxmap-janitor".to_string())
            .spawn(move || {
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        default(tick) => janitor_inner.debounce_pass(),
                    }
                }
            })
            .expect("spawn janitor thread");
        Ok(Self {
            inner,
            pool,
            janitor_stop,
            janitor: Some(janitor),
        })
    }

    /// Returns the cached mesh for `key`, rebuilding when stale or absent.
    ///
    /// Concurrent calls for the same key share one underlying build: the
    /// first caller becomes the designated builder, the rest await its
    /// result. When the voxel source cannot provide a snapshot in time, the
    /// previous mesh (stale-but-served) or the empty sentinel is returned
    /// and cache state is left unchanged so a later read retries.
    pub fn get_or_build(&self, key: &ChunkKey, bounds: YBounds) -> BuildResult {
        let inner = &self.inner;
        let shard = inner.shard(&key.world);
        let ck = key.coord();

        let role = {
            let mut s = shard.lock().expect("shard lock");
            if let Some(e) = s.entries.get(&ck) {
                if !e.dirty && !s.pending.contains_key(&ck) {
                    let mesh = e.mesh.clone();
                    s.touch(ck);
                    inner.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(mesh);
                }
            }
            if let Some(p) = s.pending.get_mut(&ck) {
                let (tx, rx) = bounded(1);
                p.waiters.push(tx);
                Role::Wait(rx)
            } else {
                s.pending.insert(
                    ck,
                    PendingBuild {
                        waiters: Vec::new(),
                        discarded: false,
                        dirtied: false,
                    },
                );
                Role::Build {
                    stale: s.entries.get(&ck).map(|e| e.mesh.clone()),
                }
            }
        };

        match role {
            Role::Wait(rx) => {
                let budget = inner.cfg.snapshot_timeout + inner.cfg.build_timeout;
                match rx.recv_timeout(budget) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => {
                        Err(MeshError::BuildTimeout(inner.cfg.build_timeout))
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        Err(MeshError::BuildFailed("builder vanished".to_string()))
                    }
                }
            }
            Role::Build { stale } => {
                inner.misses.fetch_add(1, Ordering::Relaxed);
                self.run_build(key, bounds, &shard, stale)
            }
        }
    }

    /// Designated-builder path. The shard lock is reacquired only to
    /// publish the result; never held while awaiting the source or pool.
    fn run_build(
        &self,
        key: &ChunkKey,
        bounds: YBounds,
        shard: &Arc<Mutex<WorldShard>>,
        stale: Option<Arc<ChunkMesh>>,
    ) -> BuildResult {
        let inner = &self.inner;
        let ck = key.coord();

        if inner.cfg.require_resident && !inner.source.is_resident(key) {
            debug!("chunk {key} not resident, serving {}",
                if stale.is_some() { "stale mesh" } else { "empty sentinel" });
            return self.finish(shard, ck, unbuilt(stale), false);
        }

        let ticket = inner.source.request_snapshot(key, bounds);
        let snap = match ticket.recv_timeout(inner.cfg.snapshot_timeout) {
            Ok(Some(snap)) => snap,
            Ok(None) | Err(_) => {
                debug!("snapshot unavailable for {key}, serving {}",
                    if stale.is_some() { "stale mesh" } else { "empty sentinel" });
                return self.finish(shard, ck, unbuilt(stale), false);
            }
        };

        let (tx, rx) = bounded::<ChunkMesh>(1);
        let catalog = inner.catalog.clone();
        let atlas = inner.atlas.clone();
        self.pool.spawn(move || {
            let mesh = mesh_chunk(&snap, &catalog, atlas.as_ref());
            // Receiver may be gone if the build timed out; drop the result.
            let _ = tx.send(mesh);
        });

        match rx.recv_timeout(inner.cfg.build_timeout) {
            Ok(mesh) => {
                inner.builds.fetch_add(1, Ordering::Relaxed);
                self.finish(shard, ck, Ok(Arc::new(mesh)), true)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("mesh build for {key} exceeded {:?}", inner.cfg.build_timeout);
                self.finish(shard, ck, Err(MeshError::BuildTimeout(inner.cfg.build_timeout)), false)
            }
            Err(RecvTimeoutError::Disconnected) => self.finish(
                shard,
                ck,
                Err(MeshError::BuildFailed("mesh worker dropped its result".to_string())),
                false,
            ),
        }
    }

    /// Clears the pending marker, stores a successful build (unless the key
    /// was evicted mid-flight), and wakes all waiters with the outcome.
    fn finish(
        &self,
        shard: &Arc<Mutex<WorldShard>>,
        ck: (i32, i32),
        outcome: BuildResult,
        store: bool,
    ) -> BuildResult {
        let waiters = {
            let mut s = shard.lock().expect("shard lock");
            let pending = s.pending.remove(&ck);
            let discarded = pending.as_ref().is_some_and(|p| p.discarded);
            let dirtied = pending.as_ref().is_some_and(|p| p.dirtied);
            if store && !discarded {
                if let Ok(mesh) = &outcome {
                    s.entries.insert(
                        ck,
                        Entry {
                            mesh: mesh.clone(),
                            // An edit that raced the build leaves the fresh
                            // mesh already stale.
                            dirty: dirtied,
                        },
                    );
                    s.touch(ck);
                    let evicted = s.enforce_capacity(self.inner.cfg.capacity_per_world);
                    if evicted > 0 {
                        self.inner.evictions.fetch_add(evicted, Ordering::Relaxed);
                    }
                }
            }
            pending.map(|p| p.waiters).unwrap_or_default()
        };
        for w in waiters {
            let _ = w.send(outcome.clone());
        }
        outcome
    }

    /// Marks a cached mesh stale. Idempotent; never evicts or rebuilds by
    /// itself. Refreshes the key's quiet-window deadline so bursts of edits
    /// collapse into one deferred invalidation.
    pub fn mark_dirty(&self, key: &ChunkKey) {
        let shard = self.inner.shard(&key.world);
        let known = {
            let mut s = shard.lock().expect("shard lock");
            let ck = key.coord();
            let mut known = false;
            if let Some(p) = s.pending.get_mut(&ck) {
                p.dirtied = true;
                known = true;
            }
            if let Some(e) = s.entries.get_mut(&ck) {
                e.dirty = true;
                known = true;
            }
            known
        };
        if known {
            let deadline = Instant::now() + self.inner.cfg.debounce_window;
            self.inner
                .debounce
                .lock()
                .expect("debounce lock")
                .insert(key.clone(), deadline);
        }
    }

    /// Removes the entry outright (chunk no longer resident). An in-flight
    /// build for the key completes and reaches its waiters, but its result
    /// is discarded instead of stored.
    pub fn evict(&self, key: &ChunkKey) {
        let shard = self.inner.shard(&key.world);
        let removed = {
            let mut s = shard.lock().expect("shard lock");
            if let Some(p) = s.pending.get_mut(&key.coord()) {
                p.discarded = true;
            }
            s.remove(key.coord())
        };
        if removed {
            self.inner.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("evicted chunk mesh {key}");
        }
        self.inner
            .debounce
            .lock()
            .expect("debounce lock")
            .remove(key);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            builds: self.inner.builds.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            entries: self.inner.entry_count(),
        }
    }
}

impl Drop for MeshCache {
    fn drop(&mut self) {
        let _ = self.janitor_stop.send(());
        if let Some(j) = self.janitor.take() {
            let _ = j.join();
        }
    }
}

fn unbuilt(stale: Option<Arc<ChunkMesh>>) -> BuildResult {
    Ok(stale.unwrap_or_else(|| Arc::new(ChunkMesh::empty())))
}
