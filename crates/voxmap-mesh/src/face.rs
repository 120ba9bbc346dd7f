/// Map-client face role used for atlas tile lookup; a block's top may use a
/// different tile than its sides.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FaceRole {
    Top,
    Bottom,
    Side,
}

impl FaceRole {
    #[inline]
    pub fn suffix(self) -> &'static str {
        match self {
            FaceRole::Top => "top",
            FaceRole::Bottom => "bottom",
            FaceRole::Side => "side",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Face {
    Up = 0,
    Down = 1,
    North = 2,
    South = 3,
    East = 4,
    West = 5,
}

impl Face {
    /// Fixed emission order of the mesher: lateral faces first, then bottom,
    /// then top. Changing this changes vertex ordering of built meshes.
    pub const EMIT_ORDER: [Face; 6] = [
        Face::West,
        Face::East,
        Face::North,
        Face::South,
        Face::Down,
        Face::Up,
    ];

    /// Returns the `[0..6)` index of this face.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the unit-normal vector for this face.
    #[inline]
    pub fn normal(self) -> [f32; 3] {
        match self {
            Face::Up => [0.0, 1.0, 0.0],
            Face::Down => [0.0, -1.0, 0.0],
            Face::North => [0.0, 0.0, -1.0],
            Face::South => [0.0, 0.0, 1.0],
            Face::East => [1.0, 0.0, 0.0],
            Face::West => [-1.0, 0.0, 0.0],
        }
    }

    /// Returns the integer grid delta `(dx,dy,dz)` when stepping out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Up => (0, 1, 0),
            Face::Down => (0, -1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::East => (1, 0, 0),
            Face::West => (-1, 0, 0),
        }
    }

    /// Classifies the face into top/bottom/side role for atlas lookup.
    #[inline]
    pub fn role(self) -> FaceRole {
        match self {
            Face::Up => FaceRole::Top,
            Face::Down => FaceRole::Bottom,
            _ => FaceRole::Side,
        }
    }
}
