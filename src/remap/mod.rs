//! # Tile Remapping
//!
//! Correspondence tables bind tile references of one tileset to another. A
//! table is built from base-orientation samples and then expanded so every
//! orientation of a bound tile maps to the same orientation of its image.
//!
//! - [`pattern`] builds a bidirectional table from a painted before/after pair
//! - [`migration`] builds a directional table by comparing two tilesheets
//! - [`executor`] applies a table to every tile layer of a level

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use crate::tiled::TileRef;

pub mod executor;
pub mod migration;
pub mod pattern;
pub mod search;

pub type TileMap = HashMap<TileRef, TileRef>;

/// A correspondence table, its shape fixed by how it was built.
#[derive(Clone, Debug)]
pub enum CorrespondenceTable {
    /// Migration tables only ever map old sheet -> new sheet
    Directional { forward: TileMap },
    /// Remap tables: which direction applies is detected per layer
    Bidirectional { forward: TileMap, backward: TileMap },
}

impl CorrespondenceTable {
    pub fn forward(&self) -> &TileMap {
        match self {
            CorrespondenceTable::Directional { forward } => forward,
            CorrespondenceTable::Bidirectional { forward, .. } => forward,
        }
    }

    pub fn backward(&self) -> Option<&TileMap> {
        match self {
            CorrespondenceTable::Directional { .. } => None,
            CorrespondenceTable::Bidirectional { backward, .. } => Some(backward),
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        matches!(self, CorrespondenceTable::Bidirectional { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "A->B"),
            Direction::Backward => write!(f, "B->A"),
        }
    }
}

/// Expands base pairs to all 8 orientations.
///
/// For each `(a, b)` the pair and its flipped counterpart are bound, then both
/// sides are rotated and bound again, three more times. The empty tile is
/// bound to itself first and pairs keyed on an empty tile are ignored.
/// Later pairs overwrite earlier ones; every such conflict is logged.
pub fn expand_closure(base_pairs: &[(TileRef, TileRef)]) -> TileMap {
    let mut table = TileMap::with_capacity(base_pairs.len() * 8 + 1);
    table.insert(TileRef::EMPTY, TileRef::EMPTY);

    let mut conflicts = 0usize;
    for &(a, b) in base_pairs {
        if a.is_empty() {
            debug!("Ignoring binding from the empty tile to {}", b);
            continue;
        }
        let (mut a, mut b) = (a, b);
        for step in 0..4 {
            if step > 0 {
                a = a.rotate_cell();
                b = b.rotate_cell();
            }
            conflicts += bind(&mut table, a, b);
            conflicts += bind(&mut table, a.flip_cell(), b.flip_cell());
        }
    }

    if conflicts > 0 {
        warn!(
            "{} conflicting bindings were overwritten while expanding {} base pairs",
            conflicts,
            base_pairs.len()
        );
    }
    table
}

fn bind(table: &mut TileMap, from: TileRef, to: TileRef) -> usize {
    match table.insert(from, to) {
        Some(previous) if previous != to => {
            debug!("{} was bound to {}, now {}", from, previous, to);
            1
        }
        _ => 0,
    }
}
