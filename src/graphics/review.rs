//! Review artifacts for migrations.
//!
//! Contact sheets of the tiles an operator needs to look at (unmatched tiles,
//! manually overridden bindings) plus a JSON sidecar listing the same ids.
//! Tiles are labelled with the editor's 0-based ids.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::RemapError;

use super::font::{self, GLYPH_HEIGHT};
use super::tilesheet::Tilesheet;

const SCALE: u32 = 2;
const HEADER_HEIGHT: u32 = 16;
const MIN_TILES_PER_ROW: u32 = 4;
const BINDINGS_PER_ROW: u32 = 4;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const SLOT_LIGHT: Rgba<u8> = Rgba([96, 96, 96, 255]);
const SLOT_DARK: Rgba<u8> = Rgba([64, 64, 64, 255]);
const LABEL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const HEADER: Rgba<u8> = Rgba([160, 32, 32, 255]);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReviewMetadata {
    /// Old sheet tiles with no binding, 0-based editor ids
    pub unmatched: Vec<u32>,
    /// Manual bindings that were used, 0-based editor ids
    pub overrides: Vec<OverrideEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OverrideEntry {
    pub old: u32,
    pub new: u32,
}

#[derive(Debug, Default)]
pub struct ReviewArtifacts {
    pub unmatched_sheet: Option<PathBuf>,
    pub overrides_sheet: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

/// Writes the review sheets and sidecar for a migration.
///
/// `unmatched` holds 1-based old indices, `overrides` 1-based `(old, new)`
/// bindings. Nothing is written when both are empty.
pub fn write_review(
    review_dir: &Path,
    old_sheet: &Tilesheet,
    new_sheet: &Tilesheet,
    unmatched: &[u32],
    overrides: &[(u32, u32)],
    optimise_png: bool,
) -> Result<ReviewArtifacts, RemapError> {
    let mut artifacts = ReviewArtifacts::default();
    if unmatched.is_empty() && overrides.is_empty() {
        return Ok(artifacts);
    }
    fs::create_dir_all(review_dir)?;

    if !unmatched.is_empty() {
        let tiles: Vec<(u32, &RgbaImage)> = unmatched
            .iter()
            .filter_map(|&i| old_sheet.tile(i).map(|t| (i, t)))
            .collect();
        let sheet = tiles_collage(&tiles, old_sheet.tile_size);
        let path = review_dir.join("unmatched_tiles.png");
        save_png(&sheet, &path, optimise_png)?;
        info!("Saved {} unmatched tiles to {}", tiles.len(), path.display());
        artifacts.unmatched_sheet = Some(path);
    }

    if !overrides.is_empty() {
        let pairs: Vec<((u32, &RgbaImage), (u32, &RgbaImage))> = overrides
            .iter()
            .filter_map(|&(old, new)| {
                Some(((old, old_sheet.tile(old)?), (new, new_sheet.tile(new)?)))
            })
            .collect();
        let sheet = bindings_collage(&pairs, old_sheet.tile_size);
        let path = review_dir.join("overridden_tiles.png");
        save_png(&sheet, &path, optimise_png)?;
        info!("Saved {} override bindings to {}", pairs.len(), path.display());
        artifacts.overrides_sheet = Some(path);
    }

    let metadata = ReviewMetadata {
        unmatched: unmatched.iter().map(|i| i - 1).collect(),
        overrides: overrides
            .iter()
            .map(|&(old, new)| OverrideEntry {
                old: old - 1,
                new: new - 1,
            })
            .collect(),
    };
    let path = review_dir.join("review.json");
    serde_json::to_writer_pretty(File::create(&path)?, &metadata)?;
    artifacts.metadata = Some(path);

    Ok(artifacts)
}

/// Near-square grid of tiles, each labelled with its editor id underneath.
pub fn tiles_collage(tiles: &[(u32, &RgbaImage)], tile_size: u32) -> RgbaImage {
    let spacing = tile_size;
    let count = tiles.len().max(1) as u32;
    let per_row = ((count as f32).sqrt().ceil() as u32).max(MIN_TILES_PER_ROW);
    let rows = (count + per_row - 1) / per_row;
    let pitch = tile_size + spacing;

    let width = per_row * pitch - spacing;
    let height = rows * pitch;
    let mut canvas = checkered_canvas(width, height);

    for (i, &(_, tile)) in tiles.iter().enumerate() {
        let x = (i as u32 % per_row) * pitch;
        let y = (i as u32 / per_row) * pitch;
        draw_slot(&mut canvas, x, y, tile_size);
        imageops::overlay(&mut canvas, tile, x as i64, y as i64);
    }

    let mut scaled = upscale(&canvas);
    for (i, &(index, _)) in tiles.iter().enumerate() {
        let x = (i as u32 % per_row) * pitch * SCALE;
        let y = ((i as u32 / per_row) * pitch + tile_size) * SCALE + 2;
        font::draw_text(&mut scaled, &(index - 1).to_string(), x, y, 1, LABEL);
    }

    with_header(&scaled, &tiles.len().to_string())
}

/// Old/new tile pairs side by side, labelled `old>new`.
pub fn bindings_collage(
    pairs: &[((u32, &RgbaImage), (u32, &RgbaImage))],
    tile_size: u32,
) -> RgbaImage {
    let within = tile_size;
    let between = tile_size * 2;
    let pitch_x = 2 * tile_size + within + between;
    let pitch_y = tile_size + between;
    let count = pairs.len().max(1) as u32;
    let rows = (count + BINDINGS_PER_ROW - 1) / BINDINGS_PER_ROW;

    let width = BINDINGS_PER_ROW * pitch_x - between;
    let height = rows * pitch_y;
    let mut canvas = checkered_canvas(width, height);

    for (i, ((_, old_tile), (_, new_tile))) in pairs.iter().enumerate() {
        let x = (i as u32 % BINDINGS_PER_ROW) * pitch_x;
        let y = (i as u32 / BINDINGS_PER_ROW) * pitch_y;
        let x_new = x + tile_size + within;
        draw_slot(&mut canvas, x, y, tile_size);
        draw_slot(&mut canvas, x_new, y, tile_size);
        imageops::overlay(&mut canvas, *old_tile, x as i64, y as i64);
        imageops::overlay(&mut canvas, *new_tile, x_new as i64, y as i64);
    }

    let mut scaled = upscale(&canvas);
    for (i, ((old, _), (new, _))) in pairs.iter().enumerate() {
        let x = (i as u32 % BINDINGS_PER_ROW) * pitch_x * SCALE;
        let y = ((i as u32 / BINDINGS_PER_ROW) * pitch_y + tile_size) * SCALE + 2;
        let label = format!("{}>{}", old - 1, new - 1);
        font::draw_text(&mut scaled, &label, x, y, 1, LABEL);
    }

    with_header(&scaled, &pairs.len().to_string())
}

fn checkered_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND)
}

/// Checkerboard behind a tile slot so transparent pixels stay visible
fn draw_slot(canvas: &mut RgbaImage, x: u32, y: u32, size: u32) {
    for dy in 0..size {
        for dx in 0..size {
            let (px, py) = (x + dx, y + dy);
            if px >= canvas.width() || py >= canvas.height() {
                continue;
            }
            let colour = if ((dx / 4) + (dy / 4)) % 2 == 0 {
                SLOT_LIGHT
            } else {
                SLOT_DARK
            };
            canvas.put_pixel(px, py, colour);
        }
    }
}

fn upscale(canvas: &RgbaImage) -> RgbaImage {
    imageops::resize(
        canvas,
        canvas.width() * SCALE,
        canvas.height() * SCALE,
        FilterType::Nearest,
    )
}

/// Adds a title bar carrying `title` centred on top of the sheet
fn with_header(sheet: &RgbaImage, title: &str) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(sheet.width(), sheet.height() + HEADER_HEIGHT, BACKGROUND);
    for y in 0..HEADER_HEIGHT {
        for x in 0..out.width() {
            out.put_pixel(x, y, HEADER);
        }
    }
    let text_scale = 2;
    let text_x = out.width().saturating_sub(font::text_width(title, text_scale)) / 2;
    let text_y = (HEADER_HEIGHT - GLYPH_HEIGHT * text_scale) / 2;
    font::draw_text(&mut out, title, text_x, text_y, text_scale, LABEL);
    imageops::replace(&mut out, sheet, 0, HEADER_HEIGHT as i64);
    out
}

/// Saves a PNG, re-compressed with oxipng when requested
pub fn save_png(image: &RgbaImage, path: &Path, optimise: bool) -> Result<(), RemapError> {
    if !optimise {
        image.save(path)?;
        return Ok(());
    }

    let temp_path = path.with_extension("temp.png");
    image.save(&temp_path)?;

    let options = oxipng::Options::from_preset(2);
    let result = oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &options,
    );

    if let Err(e) = fs::remove_file(&temp_path) {
        warn!("Failed to remove temporary file {}: {}", temp_path.display(), e);
    }
    result.map_err(|e| RemapError::Png(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(colour: u8) -> RgbaImage {
        RgbaImage::from_pixel(16, 16, Rgba([colour, 0, 0, 255]))
    }

    #[test]
    fn collage_is_at_least_four_tiles_wide() {
        let a = solid(10);
        let b = solid(20);
        let sheet = tiles_collage(&[(1, &a), (7, &b)], 16);
        // 4 tiles of 16px with 16px spacing, scaled 2x
        assert_eq!(sheet.width(), (4 * 32 - 16) * SCALE);
        assert_eq!(sheet.height(), 32 * SCALE + HEADER_HEIGHT);
        // first tile lands right under the header
        assert_eq!(*sheet.get_pixel(0, HEADER_HEIGHT), Rgba([10, 0, 0, 255]));
    }

    #[test]
    fn bindings_collage_places_pairs_side_by_side() {
        let old = solid(50);
        let new = solid(60);
        let sheet = bindings_collage(&[((3, &old), (9, &new))], 16);
        let x_new = (16 + 16) * SCALE;
        assert_eq!(*sheet.get_pixel(0, HEADER_HEIGHT), Rgba([50, 0, 0, 255]));
        assert_eq!(*sheet.get_pixel(x_new, HEADER_HEIGHT), Rgba([60, 0, 0, 255]));
    }
}
