//! Applies a correspondence table to every tile layer of a level.
//!
//! Nothing is written here: [`apply`] returns replacement payloads which the
//! caller renders and commits (or drops, for a simulated run).

use std::cmp::Ordering;

use log::{debug, info, warn};

use crate::error::DocumentError;
use crate::tiled::{Grid, LayerEdits, LevelDocument};

use super::{CorrespondenceTable, Direction, TileMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOutcome {
    pub layer: String,
    /// Direction committed, `None` when the layer was left untouched
    pub direction: Option<Direction>,
    pub changed_cells: usize,
}

#[derive(Debug, Default)]
pub struct RemapOutcome {
    pub edits: LayerEdits,
    pub layers: Vec<LayerOutcome>,
}

impl RemapOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn changed_cells(&self) -> usize {
        self.layers.iter().map(|l| l.changed_cells).sum()
    }
}

/// Remaps each tile layer, each decoded and re-encoded in its own format.
///
/// Bidirectional tables try both directions and commit the one that changes
/// strictly more cells. Layers no direction changes keep their original text.
pub fn apply(table: &CorrespondenceTable, document: &LevelDocument) -> Result<RemapOutcome, DocumentError> {
    let mut outcome = RemapOutcome::default();

    for (index, layer) in document.layers().iter().enumerate() {
        let grid = document.tile_grid(index)?;

        let choice = match table {
            CorrespondenceTable::Directional { forward } => {
                let candidate = remap_grid(&grid, forward);
                let hits = grid.count_differences(&candidate);
                (hits > 0).then_some((Direction::Forward, candidate, hits))
            }
            CorrespondenceTable::Bidirectional { forward, backward } => {
                let to_b = remap_grid(&grid, forward);
                let to_a = remap_grid(&grid, backward);
                let hits_b = grid.count_differences(&to_b);
                let hits_a = grid.count_differences(&to_a);
                debug!(
                    "{}: layer {} A->B {} hits, B->A {} hits",
                    document.name(),
                    layer.display_name(),
                    hits_b,
                    hits_a
                );
                match hits_b.cmp(&hits_a) {
                    Ordering::Greater => Some((Direction::Forward, to_b, hits_b)),
                    Ordering::Less => Some((Direction::Backward, to_a, hits_a)),
                    Ordering::Equal => {
                        if hits_b > 0 {
                            warn!(
                                "{}: layer {} matches {} cells in both directions, left untouched",
                                document.name(),
                                layer.display_name(),
                                hits_b
                            );
                        }
                        None
                    }
                }
            }
        };

        match choice {
            Some((direction, remapped, hits)) => {
                outcome
                    .edits
                    .insert(index, document.encode_for_layer(index, &remapped)?);
                info!(
                    "{}: layer {} remapped {} tiles ({})",
                    document.name(),
                    layer.display_name(),
                    hits,
                    direction
                );
                outcome.layers.push(LayerOutcome {
                    layer: layer.display_name(),
                    direction: Some(direction),
                    changed_cells: hits,
                });
            }
            None => outcome.layers.push(LayerOutcome {
                layer: layer.display_name(),
                direction: None,
                changed_cells: 0,
            }),
        }
    }

    Ok(outcome)
}

/// Passes every non-empty cell through `map`; cells without a binding stay as they are.
pub fn remap_grid(grid: &Grid, map: &TileMap) -> Grid {
    grid.map_cells(|r| map.get(&r).copied().unwrap_or(r))
}
