use std::fmt;

/// Cache key for one chunk column. World names partition the cache into
/// independent namespaces; coordinates never collide across worlds.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChunkKey {
    pub world: String,
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    pub fn new(world: impl Into<String>, cx: i32, cz: i32) -> Self {
        Self {
            world: world.into(),
            cx,
            cz,
        }
    }

    /// Per-world coordinate key used inside a world shard.
    #[inline]
    pub fn coord(&self) -> (i32, i32) {
        (self.cx, self.cz)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.world, self.cx, self.cz)
    }
}
