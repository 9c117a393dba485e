//! Searching levels for a tile in any orientation.

use std::collections::HashSet;

use crate::error::DocumentError;
use crate::tiled::{LevelDocument, TileRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileHit {
    pub layer: String,
    pub x: usize,
    pub y: usize,
    pub tile: TileRef,
}

/// Every cell, across all tile layers, holding one of `targets`.
pub fn find_tiles(document: &LevelDocument, targets: &[TileRef]) -> Result<Vec<TileHit>, DocumentError> {
    let wanted: HashSet<TileRef> = targets.iter().copied().collect();
    let mut hits = Vec::new();

    for (index, layer) in document.layers().iter().enumerate() {
        let grid = document.tile_grid(index)?;
        for (y, row) in grid.rows().enumerate() {
            for (x, &tile) in row.iter().enumerate() {
                if wanted.contains(&tile) {
                    hits.push(TileHit {
                        layer: layer.display_name(),
                        x,
                        y,
                        tile,
                    });
                }
            }
        }
    }

    Ok(hits)
}
