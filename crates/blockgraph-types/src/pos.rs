//! Integer cell positions, faces, and region coordinates.
//!
//! A [`BlockPos`] names one cell of the world lattice. Nodes that sit on a
//! face of a cell rather than filling it are addressed by a [`SidedPos`].
//! Cells are grouped into cubic regions of `2^REGION_SHIFT` cells per edge;
//! a [`RegionPos`] is the unit of persistence and of the unload timer.

use serde::{Deserialize, Serialize};

/// Number of bits a cell coordinate is shifted right to obtain its region
/// coordinate. Regions are 16 cells on each edge.
pub const REGION_SHIFT: u32 = 4;

/// Number of cells along one edge of a region.
pub const REGION_SIZE: i32 = 1 << REGION_SHIFT;

/// One of the six axis-aligned faces of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Negative Y.
    Down,
    /// Positive Y.
    Up,
    /// Negative Z.
    North,
    /// Positive Z.
    South,
    /// Negative X.
    West,
    /// Positive X.
    East,
}

/// The three lattice axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// The X axis (west/east).
    X,
    /// The Y axis (down/up).
    Y,
    /// The Z axis (north/south).
    Z,
}

impl Direction {
    /// All six directions in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Down,
        Self::Up,
        Self::North,
        Self::South,
        Self::West,
        Self::East,
    ];

    /// Return the direction pointing the other way.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    /// Return the axis this direction lies on.
    pub const fn axis(self) -> Axis {
        match self {
            Self::Down | Self::Up => Axis::Y,
            Self::North | Self::South => Axis::Z,
            Self::West | Self::East => Axis::X,
        }
    }

    /// Return the unit offset `(dx, dy, dz)` of this direction.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Down => (0, -1, 0),
            Self::Up => (0, 1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }

    /// Return the four directions perpendicular to this one.
    pub fn perpendiculars(self) -> [Self; 4] {
        match self.axis() {
            Axis::X => [Self::Down, Self::Up, Self::North, Self::South],
            Axis::Y => [Self::North, Self::South, Self::West, Self::East],
            Axis::Z => [Self::Down, Self::Up, Self::West, Self::East],
        }
    }
}

/// A cell position in the world lattice.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// The lattice origin.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return the neighbouring cell in the given direction.
    ///
    /// Coordinates saturate at the `i32` bounds instead of wrapping.
    pub const fn offset(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// Return the six face-adjacent neighbours of this cell.
    pub fn neighbours(self) -> [Self; 6] {
        Direction::ALL.map(|d| self.offset(d))
    }

    /// Return the region containing this cell.
    pub const fn region(self) -> RegionPos {
        RegionPos::from_block(self)
    }
}

impl core::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A cell position together with one of its faces.
///
/// Used for nodes that occupy a side of a cell, such as a wire lying on a
/// floor, rather than the whole cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SidedPos {
    /// The cell.
    pub pos: BlockPos,
    /// The face of the cell.
    pub side: Direction,
}

impl SidedPos {
    /// Create a sided position.
    pub const fn new(pos: BlockPos, side: Direction) -> Self {
        Self { pos, side }
    }
}

/// A region coordinate: a cell position shifted right by [`REGION_SHIFT`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RegionPos {
    /// Region X coordinate.
    pub x: i32,
    /// Region Y coordinate.
    pub y: i32,
    /// Region Z coordinate.
    pub z: i32,
}

impl RegionPos {
    /// Create a region position from its coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return the region containing the given cell.
    ///
    /// Arithmetic shift floors toward negative infinity, so cell `-1` lands
    /// in region `-1` rather than region `0`.
    pub const fn from_block(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> REGION_SHIFT,
            y: pos.y >> REGION_SHIFT,
            z: pos.z >> REGION_SHIFT,
        }
    }

    /// Return the cell with the smallest coordinates inside this region.
    pub const fn min_block(self) -> BlockPos {
        BlockPos {
            x: self.x.saturating_mul(REGION_SIZE),
            y: self.y.saturating_mul(REGION_SIZE),
            z: self.z.saturating_mul(REGION_SIZE),
        }
    }

    /// Check whether the given cell lies inside this region.
    pub fn contains(self, pos: BlockPos) -> bool {
        Self::from_block(pos) == self
    }
}

impl core::fmt::Display for RegionPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}
