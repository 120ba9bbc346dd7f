//! Chunk mesh cache: dirty tracking, debounce, LRU and single-flight builds.
#![forbid(unsafe_code)]

pub mod cache;
pub mod key;
pub mod source;

pub use cache::{CacheConfig, CacheInitError, CacheStats, MeshCache, MeshError};
pub use key::ChunkKey;
pub use source::{SnapshotTicket, VoxelSource};
