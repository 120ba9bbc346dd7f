//! Exposed-face chunk meshing and the texture atlas query contract.
#![forbid(unsafe_code)]

pub mod atlas;
pub mod face;
pub mod mesh;
pub mod mesher;

pub use atlas::{AtlasIndex, TextureAtlas, UvRect};
pub use face::{Face, FaceRole};
pub use mesh::{ChunkMesh, MeshBuild};
pub use mesher::mesh_chunk;
