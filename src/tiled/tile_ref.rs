//! # Tile References
//!
//! Every cell of a tile layer is a packed 32-bit value. The low 29 bits hold a
//! 1-based index into the tilesheet (0 = empty cell) and the top 3 bits select
//! one of the 8 orientations the editor can give a placed tile.
//!
//! ```text
//! 31  30  29  28 ............................. 0
//! H   V   D   tile index (1-based, 0 = empty)
//! ```

use std::fmt;

pub const INDEX_MASK: u32 = 0x1FFF_FFFF; // 0001 1111 ... 1111
pub const ORIENTATION_SHIFT: u32 = 29;
pub const ORIENTATION_BITS: u32 = 0b111;

pub const FLAG_HORIZONTAL: u32 = 0b100;
pub const FLAG_VERTICAL: u32 = 0b010;
pub const FLAG_DIAGONAL: u32 = 0b001;

/// Orientation bits after one 90 degree clockwise rotation, indexed by the
/// current bits. Two disjoint 4-cycles:
/// 000 -> 101 -> 110 -> 011 -> 000 and 100 -> 111 -> 010 -> 001 -> 100.
const ROTATE_CW: [u32; 8] = [
    0b101, // 000
    0b100, // 001
    0b001, // 010
    0b000, // 011
    0b111, // 100
    0b110, // 101
    0b011, // 110
    0b010, // 111
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileRef(pub u32);

impl TileRef {
    pub const EMPTY: TileRef = TileRef(0);

    pub fn new(index: u32, orientation: u32) -> Self {
        TileRef(
            (index & INDEX_MASK) | ((orientation & ORIENTATION_BITS) << ORIENTATION_SHIFT),
        )
    }

    /// 1-based tilesheet index, 0 when the cell is empty
    pub fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    pub fn orientation(self) -> u32 {
        (self.0 >> ORIENTATION_SHIFT) & ORIENTATION_BITS
    }

    pub fn with_orientation(self, orientation: u32) -> Self {
        TileRef::new(self.index(), orientation)
    }

    pub fn is_empty(self) -> bool {
        self.index() == 0
    }

    /// Mirror horizontally by toggling bit 31. Involutive.
    pub fn flip(self) -> Self {
        TileRef(self.0 ^ (1 << 31))
    }

    /// Rotate 90 degrees clockwise. Four rotations are the identity.
    pub fn rotate(self) -> Self {
        let rotated = ROTATE_CW[self.orientation() as usize];
        TileRef((self.0 & INDEX_MASK) | (rotated << ORIENTATION_SHIFT))
    }

    /// Same as [`TileRef::flip`], except the empty cell has no orientation
    /// and is returned unchanged.
    pub fn flip_cell(self) -> Self {
        if self.is_empty() {
            self
        } else {
            self.flip()
        }
    }

    /// Same as [`TileRef::rotate`], leaving the empty cell unchanged.
    pub fn rotate_cell(self) -> Self {
        if self.is_empty() {
            self
        } else {
            self.rotate()
        }
    }

    /// All 8 references reachable through the orientation group, in the order
    /// `[r, flip(r), rot(r), flip(rot(r)), rot²(r), ...]`.
    pub fn permutations(self) -> [TileRef; 8] {
        let mut out = [self; 8];
        let mut current = self;
        out[1] = current.flip();
        for step in 1..4 {
            current = current.rotate();
            out[step * 2] = current;
            out[step * 2 + 1] = current.flip();
        }
        out
    }

    /// Converts the editor's 0-based tile id into a reference at base orientation
    pub fn from_editor_id(id: u32) -> Self {
        TileRef::new(id + 1, 0)
    }
}

impl From<u32> for TileRef {
    fn from(value: u32) -> Self {
        TileRef(value)
    }
}

impl fmt::Display for TileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.orientation() == 0 {
            write!(f, "#{}", self.index())
        } else {
            write!(f, "#{}/{:03b}", self.index(), self.orientation())
        }
    }
}
