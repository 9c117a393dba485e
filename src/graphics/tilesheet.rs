//! Tilesheet slicing and tile bitmap hashing.
//!
//! A tilesheet is one image treated as a grid of square tiles. Tile indices are
//! 1-based in raster order, matching the indices stored in tile references.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use image::{imageops, ImageBuffer, RgbaImage};
use twox_hash::XxHash64;

use crate::error::{ConfigError, RemapError};
use crate::tiled::tile_ref::{FLAG_DIAGONAL, FLAG_HORIZONTAL, FLAG_VERTICAL};

pub const DEFAULT_TILE_SIZE: u32 = 16;

#[derive(Debug)]
pub struct Tilesheet {
    pub columns: u32,
    pub rows: u32,
    pub tile_size: u32,
    tiles: Vec<RgbaImage>,
}

impl Tilesheet {
    pub fn open(path: &Path, tile_size: u32) -> Result<Self, RemapError> {
        let image = image::open(path)?.to_rgba8();
        Self::from_image(&image, tile_size)
    }

    /// Slices an image into tiles. Dimensions must be whole multiples of `tile_size`.
    pub fn from_image(image: &RgbaImage, tile_size: u32) -> Result<Self, RemapError> {
        let (width, height) = image.dimensions();
        if tile_size == 0 || width % tile_size != 0 || height % tile_size != 0 {
            return Err(ConfigError::Migration(format!(
                "{}x{} sheet is not a grid of {}px tiles",
                width, height, tile_size
            ))
            .into());
        }

        let columns = width / tile_size;
        let rows = height / tile_size;
        let mut tiles = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for col in 0..columns {
                let tile =
                    imageops::crop_imm(image, col * tile_size, row * tile_size, tile_size, tile_size)
                        .to_image();
                tiles.push(tile);
            }
        }

        Ok(Tilesheet {
            columns,
            rows,
            tile_size,
            tiles,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.columns * self.tile_size, self.rows * self.tile_size)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Bitmap of a 1-based tile index
    pub fn tile(&self, index: u32) -> Option<&RgbaImage> {
        index
            .checked_sub(1)
            .and_then(|i| self.tiles.get(i as usize))
    }

    /// `(index, bitmap)` for every tile, 1-based
    pub fn iter(&self) -> impl Iterator<Item = (u32, &RgbaImage)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, tile)| (i as u32 + 1, tile))
    }
}

/// Hash lookup from tile bitmap to 1-based index. The first tile in raster
/// order wins when a sheet holds duplicates.
pub struct TileIndex<'a> {
    sheet: &'a Tilesheet,
    by_hash: HashMap<u64, u32>,
}

impl<'a> TileIndex<'a> {
    pub fn new(sheet: &'a Tilesheet) -> Self {
        let mut by_hash = HashMap::with_capacity(sheet.len());
        for (index, tile) in sheet.iter() {
            if let Entry::Vacant(entry) = by_hash.entry(tile_hash(tile)) {
                entry.insert(index);
            }
        }
        TileIndex { sheet, by_hash }
    }

    /// Finds the tile with byte-identical pixels, if any
    pub fn find(&self, bitmap: &RgbaImage) -> Option<u32> {
        let candidate = *self.by_hash.get(&tile_hash(bitmap))?;
        // Confirm to rule out hash collisions
        let tile = self.sheet.tile(candidate)?;
        tiles_are_identical(tile, bitmap).then_some(candidate)
    }
}

/// Calculate a 64-bit hash of a tile bitmap for fast comparison
pub fn tile_hash(tile: &RgbaImage) -> u64 {
    let mut hasher = XxHash64::default();
    tile.dimensions().hash(&mut hasher);
    tile.as_raw().hash(&mut hasher);
    hasher.finish()
}

fn tiles_are_identical(a: &RgbaImage, b: &RgbaImage) -> bool {
    a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
}

/// Renders a tile the way the editor draws it with the given orientation bits:
/// the diagonal flag transposes first, then the horizontal and vertical
/// flags mirror.
pub fn oriented(tile: &RgbaImage, orientation: u32) -> RgbaImage {
    let mut out = if orientation & FLAG_DIAGONAL != 0 {
        ImageBuffer::from_fn(tile.height(), tile.width(), |x, y| *tile.get_pixel(y, x))
    } else {
        tile.clone()
    };
    if orientation & FLAG_HORIZONTAL != 0 {
        imageops::flip_horizontal_in_place(&mut out);
    }
    if orientation & FLAG_VERTICAL != 0 {
        imageops::flip_vertical_in_place(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 2x2 tile with four distinct pixels
    fn asymmetric_tile(seed: u8) -> RgbaImage {
        ImageBuffer::from_fn(2, 2, |x, y| Rgba([seed, x as u8, y as u8, 255]))
    }

    fn sheet_of(tiles: &[RgbaImage], columns: u32) -> RgbaImage {
        let rows = (tiles.len() as u32 + columns - 1) / columns;
        let mut sheet = RgbaImage::new(columns * 2, rows * 2);
        for (i, tile) in tiles.iter().enumerate() {
            let (x, y) = ((i as u32 % columns) * 2, (i as u32 / columns) * 2);
            imageops::replace(&mut sheet, tile, x as i64, y as i64);
        }
        sheet
    }

    #[test]
    fn slices_in_raster_order() {
        let tiles: Vec<_> = (0..6).map(asymmetric_tile).collect();
        let sheet = Tilesheet::from_image(&sheet_of(&tiles, 3), 2).unwrap();
        assert_eq!((sheet.columns, sheet.rows), (3, 2));
        assert_eq!(sheet.tile(4), Some(&tiles[3]));
        assert_eq!(sheet.tile(0), None);
        assert_eq!(sheet.tile(7), None);
    }

    #[test]
    fn rejects_partial_tiles() {
        let image = RgbaImage::new(5, 4);
        assert!(Tilesheet::from_image(&image, 2).is_err());
    }

    #[test]
    fn finds_identical_bitmaps_first_wins() {
        let tiles = vec![asymmetric_tile(1), asymmetric_tile(2), asymmetric_tile(1)];
        let sheet = Tilesheet::from_image(&sheet_of(&tiles, 3), 2).unwrap();
        let index = TileIndex::new(&sheet);
        assert_eq!(index.find(&asymmetric_tile(1)), Some(1));
        assert_eq!(index.find(&asymmetric_tile(2)), Some(2));
        assert_eq!(index.find(&asymmetric_tile(9)), None);
    }

    #[test]
    fn orientation_bits_compose_like_rotation() {
        let tile = asymmetric_tile(3);
        // 101 is a clockwise quarter turn
        let quarter = oriented(&tile, 0b101);
        let expected = imageops::rotate90(&tile);
        assert_eq!(quarter, expected);
        assert_eq!(oriented(&tile, 0), tile);
        assert_eq!(oriented(&tile, 0b110), imageops::rotate180(&tile));
    }
}
