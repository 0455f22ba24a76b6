//! Cell coordinates and footprints for grid storage.

use serde::{Deserialize, Serialize};

/// Position of a cell in a grid inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    /// Column index
    pub x: i32,
    /// Row index
    pub y: i32,
}

impl CellPos {
    /// Creates a new cell position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Origin cell (0, 0).
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Returns this position offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for CellPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Rectangular cell extent occupied by a stock unit in a grid inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Width in cells (>= 1)
    pub width: u32,
    /// Height in cells (>= 1)
    pub height: u32,
}

impl Footprint {
    /// Creates a new footprint, clamping both extents to at least one cell.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Single-cell footprint, the default for templates without a
    /// footprint capability.
    pub const SINGLE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Total number of cells covered.
    #[must_use]
    pub const fn cell_count(self) -> u32 {
        self.width * self.height
    }

    /// Iterates every cell covered when anchored at `origin`, row by row.
    pub fn cells(self, origin: CellPos) -> impl Iterator<Item = CellPos> {
        (0..self.height as i32).flat_map(move |dy| {
            (0..self.width as i32).map(move |dx| origin.offset(dx, dy))
        })
    }

    /// Checks whether `pos` falls inside the footprint anchored at `origin`.
    #[must_use]
    pub const fn contains(self, origin: CellPos, pos: CellPos) -> bool {
        pos.x >= origin.x
            && pos.y >= origin.y
            && pos.x < origin.x + self.width as i32
            && pos.y < origin.y + self.height as i32
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl std::fmt::Display for Footprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
