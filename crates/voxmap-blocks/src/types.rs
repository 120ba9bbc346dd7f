/// Stable identifier of a catalog material. Id 0 is always the air sentinel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u16);

impl MaterialId {
    pub const AIR: MaterialId = MaterialId(0);
}

/// Cutout materials render as full cube faces but never occlude neighbors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CutoutKind {
    Leaves,
    Water,
    Lava,
}

/// Vertex color multiplier category. Values tuned to look vanilla-ish
/// without biome blending.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TintCategory {
    #[default]
    None,
    GrassPlant,
    Foliage,
    Water,
    Lava,
}

impl TintCategory {
    /// RGB multiplier applied to every vertex of a tinted face.
    #[inline]
    pub fn rgb(self) -> [f32; 3] {
        match self {
            TintCategory::None => [1.0, 1.0, 1.0],
            TintCategory::GrassPlant => [0.58, 0.84, 0.40],
            TintCategory::Foliage => [0.30, 0.65, 0.28],
            TintCategory::Water => [0.40, 0.63, 0.98],
            TintCategory::Lava => [1.25, 0.90, 0.21],
        }
    }
}

/// Compiled classification of one material. Total over `MaterialId`: lookups
/// for unknown ids resolve to [`MaterialFlags::AIR`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaterialFlags {
    pub air: bool,
    pub solid: bool,
    pub occluder: bool,
    pub cutout: Option<CutoutKind>,
    /// Explicitly allow-listed transparent cubes (glass, ice).
    pub render_allow: bool,
    pub tint: TintCategory,
    /// Grass tint on the up face only; other faces keep `tint`.
    pub grass_top: bool,
    pub emitter: Option<f32>,
}

impl MaterialFlags {
    pub const AIR: MaterialFlags = MaterialFlags {
        air: true,
        solid: false,
        occluder: false,
        cutout: None,
        render_allow: false,
        tint: TintCategory::None,
        grass_top: false,
        emitter: None,
    };

    /// True iff this material hides the face of an adjacent cube.
    /// Cutouts never occlude even though they render.
    #[inline]
    pub fn occludes(&self) -> bool {
        !self.air && self.cutout.is_none() && self.solid && self.occluder
    }

    /// True iff the mesher emits cube faces for this material. Non-cube
    /// blocks (plants, stairs, ...) fail this and are skipped entirely.
    #[inline]
    pub fn is_renderable(&self) -> bool {
        if self.air {
            return false;
        }
        (self.solid && self.occluder) || self.cutout.is_some() || self.render_allow
    }

    #[inline]
    pub fn is_emitter(&self) -> bool {
        self.emitter.is_some()
    }
}
