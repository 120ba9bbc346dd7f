use crossbeam_channel::Receiver;

use voxmap_chunk::{ChunkSnapshot, YBounds};

use crate::key::ChunkKey;

/// One-shot delivery of a requested snapshot. `None` means the source could
/// not provide one (chunk not resident); a dropped sender reads the same way.
pub type SnapshotTicket = Receiver<Option<ChunkSnapshot>>;

/// The authoritative voxel data source. Snapshot capture may have to hop to
/// a single-threaded owner, so the request is a ticket the cache awaits with
/// its own timeout rather than a direct call.
pub trait VoxelSource: Send + Sync {
    fn request_snapshot(&self, key: &ChunkKey, bounds: YBounds) -> SnapshotTicket;

    /// Whether the chunk is currently loaded by the source.
    fn is_resident(&self, key: &ChunkKey) -> bool;
}
