//! Migration tables from two tilesheet images.
//!
//! When the master tilesheet is reorganised, every old tile index has to be
//! rebound to where its artwork now lives. Tiles are matched by bitmap hash;
//! misses fall back to operator supplied overrides, then to a search over the
//! 7 other orientations of the old bitmap. Whatever is left is unmatched and
//! reported for review.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{ConfigError, RemapError};
use crate::graphics::review::{self, ReviewArtifacts};
use crate::graphics::tilesheet::{oriented, TileIndex, Tilesheet, DEFAULT_TILE_SIZE};
use crate::tiled::TileRef;

use super::{expand_closure, CorrespondenceTable};

/// What happens to old tiles nobody could bind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Cells keep their old reference
    #[default]
    PassThrough,
    /// Every orientation of the tile is bound to the empty tile
    Zero,
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub tile_size: u32,
    pub unmatched_policy: UnmatchedPolicy,
    pub review_dir: Option<PathBuf>,
    pub optimise_png: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            unmatched_policy: UnmatchedPolicy::PassThrough,
            review_dir: None,
            optimise_png: true,
        }
    }
}

/// Explicit old -> new bindings. Stored 0-based as written by the operator.
#[derive(Debug, Clone, Default)]
pub struct OverrideBindings {
    bindings: BTreeMap<u32, u32>,
}

impl OverrideBindings {
    /// Reads a JSON object such as `{"9": 20, "15": 3}` (0-based editor ids).
    pub fn load(path: &Path) -> Result<Self, RemapError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn from_json(text: &str, file: &str) -> Result<Self, RemapError> {
        let bindings: BTreeMap<u32, u32> =
            serde_json::from_str(text).map_err(|e| ConfigError::Overrides {
                file: file.to_string(),
                reason: e.to_string(),
            })?;
        Ok(OverrideBindings { bindings })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>) -> Self {
        OverrideBindings {
            bindings: pairs.into_iter().collect(),
        }
    }

    /// 1-based new index for a 1-based old index
    pub fn get(&self, old_index: u32) -> Option<u32> {
        let old_id = old_index.checked_sub(1)?;
        self.bindings.get(&old_id).map(|new_id| new_id + 1)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Bookkeeping of how each old index was resolved. Indices are 1-based.
#[derive(Debug, Default, Clone)]
pub struct MigrationReport {
    pub matched: usize,
    pub overridden: Vec<(u32, u32)>,
    /// Old tiles found in the new sheet only in another orientation
    pub reoriented: Vec<(u32, TileRef)>,
    /// The unmatched set, after rotated/flipped duplicates were pruned
    pub unmatched: BTreeSet<u32>,
}

#[derive(Debug)]
pub struct Migration {
    pub table: CorrespondenceTable,
    pub report: MigrationReport,
}

/// Builds the old -> new table for two sheets of identical size.
pub fn build_from_tilesheet_comparison(
    old_sheet: &Tilesheet,
    new_sheet: &Tilesheet,
    overrides: &OverrideBindings,
    policy: UnmatchedPolicy,
) -> Result<Migration, RemapError> {
    if old_sheet.dimensions() != new_sheet.dimensions() || old_sheet.tile_size != new_sheet.tile_size {
        let (ow, oh) = old_sheet.dimensions();
        let (nw, nh) = new_sheet.dimensions();
        return Err(ConfigError::Migration(format!(
            "old sheet is {}x{} but new sheet is {}x{}",
            ow, oh, nw, nh
        ))
        .into());
    }

    let lookup = TileIndex::new(new_sheet);
    let mut base_pairs = Vec::with_capacity(old_sheet.len());
    let mut report = MigrationReport::default();

    for (old_index, bitmap) in old_sheet.iter() {
        if let Some(new_index) = lookup.find(bitmap) {
            base_pairs.push((TileRef::new(old_index, 0), TileRef::new(new_index, 0)));
            report.matched += 1;
            continue;
        }
        if let Some(new_index) = overrides.get(old_index) {
            if new_sheet.tile(new_index).is_none() {
                return Err(ConfigError::Migration(format!(
                    "override {} -> {} points outside the new sheet ({} tiles)",
                    old_index - 1,
                    new_index - 1,
                    new_sheet.len()
                ))
                .into());
            }
            base_pairs.push((TileRef::new(old_index, 0), TileRef::new(new_index, 0)));
            report.overridden.push((old_index, new_index));
            continue;
        }
        report.unmatched.insert(old_index);
    }

    // A miss may still be a rotated or flipped copy of a tile in the new sheet
    report.unmatched.retain(|&old_index| {
        let Some(bitmap) = old_sheet.tile(old_index) else {
            return true;
        };
        for orientation in 1..8 {
            if let Some(new_index) = lookup.find(&oriented(bitmap, orientation)) {
                let old_ref = TileRef::new(old_index, orientation);
                let new_ref = TileRef::new(new_index, 0);
                debug!("{} renders as {}", old_ref, new_ref);
                base_pairs.push((old_ref, new_ref));
                report.reoriented.push((old_index, new_ref.with_orientation(0)));
                return false;
            }
        }
        true
    });

    if policy == UnmatchedPolicy::Zero {
        for &old_index in &report.unmatched {
            base_pairs.push((TileRef::new(old_index, 0), TileRef::EMPTY));
        }
    }

    info!(
        "Migration: {} matched, {} overridden, {} reoriented, {} unmatched",
        report.matched,
        report.overridden.len(),
        report.reoriented.len(),
        report.unmatched.len()
    );

    Ok(Migration {
        table: CorrespondenceTable::Directional {
            forward: expand_closure(&base_pairs),
        },
        report,
    })
}

/// Loads both sheets and the optional overrides, builds the table and writes
/// the review artifacts when `config.review_dir` is set.
pub fn prepare_migration(
    config: &MigrationConfig,
    old_sheet_path: &Path,
    new_sheet_path: &Path,
    overrides_path: Option<&Path>,
) -> Result<(Migration, ReviewArtifacts), RemapError> {
    let old_sheet = Tilesheet::open(old_sheet_path, config.tile_size)?;
    let new_sheet = Tilesheet::open(new_sheet_path, config.tile_size)?;
    info!(
        "Old sheet {} tiles, new sheet {} tiles ({}px)",
        old_sheet.len(),
        new_sheet.len(),
        config.tile_size
    );

    let overrides = match overrides_path {
        Some(path) => OverrideBindings::load(path)?,
        None => OverrideBindings::default(),
    };

    let migration =
        build_from_tilesheet_comparison(&old_sheet, &new_sheet, &overrides, config.unmatched_policy)?;

    let artifacts = match config.review_dir.as_deref() {
        Some(dir) => {
            let unmatched: Vec<u32> = migration.report.unmatched.iter().copied().collect();
            review::write_review(
                dir,
                &old_sheet,
                &new_sheet,
                &unmatched,
                &migration.report.overridden,
                config.optimise_png,
            )?
        }
        None => ReviewArtifacts::default(),
    };

    Ok((migration, artifacts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, ImageBuffer, Rgba, RgbaImage};

    fn asymmetric_tile(seed: u8) -> RgbaImage {
        ImageBuffer::from_fn(2, 2, |x, y| Rgba([seed, x as u8, y as u8, 255]))
    }

    /// 3x3 sheet of 2px tiles
    fn sheet(tiles: &[RgbaImage]) -> Tilesheet {
        let mut image = RgbaImage::new(6, 6);
        for (i, tile) in tiles.iter().enumerate() {
            let (x, y) = ((i as u32 % 3) * 2, (i as u32 / 3) * 2);
            imageops::replace(&mut image, tile, x as i64, y as i64);
        }
        Tilesheet::from_image(&image, 2).unwrap()
    }

    fn old_tiles() -> Vec<RgbaImage> {
        (1..=9).map(|i| asymmetric_tile(100 + i)).collect()
    }

    fn new_tiles() -> Vec<RgbaImage> {
        (1..=9).map(|i| asymmetric_tile(200 + i)).collect()
    }

    #[test]
    fn identical_bitmaps_bind_and_misses_are_unmatched() {
        let old = old_tiles();
        let mut new = new_tiles();
        new[8] = old[2].clone(); // old #3 == new #9

        let migration = build_from_tilesheet_comparison(
            &sheet(&old),
            &sheet(&new),
            &OverrideBindings::default(),
            UnmatchedPolicy::PassThrough,
        )
        .unwrap();

        let forward = migration.table.forward();
        assert_eq!(forward.get(&TileRef(3)), Some(&TileRef(9)));
        assert_eq!(forward.get(&TileRef(3).rotate()), Some(&TileRef(9).rotate()));
        assert!(!forward.contains_key(&TileRef(4)));
        assert!(migration.report.unmatched.contains(&4));
        assert!(!migration.report.unmatched.contains(&3));
        assert!(!migration.table.is_bidirectional());
    }

    #[test]
    fn overrides_are_shifted_to_one_based() {
        let overrides = OverrideBindings::from_json(r#"{"9": 20}"#, "overrides.json").unwrap();
        assert_eq!(overrides.get(10), Some(21));
        assert_eq!(overrides.get(9), None);
        assert_eq!(overrides.get(0), None);
    }

    #[test]
    fn override_resolves_a_miss() {
        let overrides = OverrideBindings::from_pairs([(3, 6)]);
        let migration = build_from_tilesheet_comparison(
            &sheet(&old_tiles()),
            &sheet(&new_tiles()),
            &overrides,
            UnmatchedPolicy::PassThrough,
        )
        .unwrap();

        assert_eq!(migration.table.forward().get(&TileRef(4)), Some(&TileRef(7)));
        assert_eq!(migration.report.overridden, vec![(4, 7)]);
        assert!(!migration.report.unmatched.contains(&4));
    }

    #[test]
    fn rotated_copies_are_not_unmatched() {
        let old = old_tiles();
        let mut new = new_tiles();
        // new #5 holds old #2 turned a quarter clockwise
        new[4] = imageops::rotate90(&old[1]);

        let migration = build_from_tilesheet_comparison(
            &sheet(&old),
            &sheet(&new),
            &OverrideBindings::default(),
            UnmatchedPolicy::PassThrough,
        )
        .unwrap();

        assert!(!migration.report.unmatched.contains(&2));
        let quarter = TileRef::new(2, 0b101);
        assert_eq!(migration.table.forward().get(&quarter), Some(&TileRef(5)));
        // identity orientation of the old tile maps to the counter-rotated new tile
        let back = TileRef(5).rotate().rotate().rotate();
        assert_eq!(migration.table.forward().get(&TileRef(2)), Some(&back));
    }

    #[test]
    fn zero_policy_empties_unmatched_tiles() {
        let migration = build_from_tilesheet_comparison(
            &sheet(&old_tiles()),
            &sheet(&new_tiles()),
            &OverrideBindings::default(),
            UnmatchedPolicy::Zero,
        )
        .unwrap();

        assert_eq!(migration.report.unmatched.len(), 9);
        for r in TileRef(4).permutations() {
            assert_eq!(migration.table.forward().get(&r), Some(&TileRef::EMPTY));
        }
        assert_eq!(migration.table.forward().get(&TileRef::EMPTY), Some(&TileRef::EMPTY));
    }

    #[test]
    fn mismatched_sheets_are_fatal() {
        let small = Tilesheet::from_image(&RgbaImage::new(4, 4), 2).unwrap();
        let result = build_from_tilesheet_comparison(
            &small,
            &sheet(&new_tiles()),
            &OverrideBindings::default(),
            UnmatchedPolicy::PassThrough,
        );
        assert!(matches!(result, Err(RemapError::Config(ConfigError::Migration(_)))));
    }
}
