//! # Grid Codec
//!
//! Converts between a [`Grid`] and the text stored inside a layer's `<data>`
//! element. Compact layers are little-endian u32 cells, optionally compressed,
//! then base64 encoded. Plain layers are comma separated decimals.

use std::fmt;
use std::io::{Read, Write};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::CodecError;

use super::{grid::Grid, tile_ref::TileRef};

const CELL_BYTES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    Gzip,
}

/// Declared encoding of a layer payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridFormat {
    Csv,
    Base64(Compression),
}

impl GridFormat {
    /// Resolves the `encoding` / `compression` attribute pair of a `<data>` element.
    pub fn from_attributes(
        encoding: Option<&str>,
        compression: Option<&str>,
    ) -> Result<Self, CodecError> {
        match (encoding, compression) {
            (Some("csv"), None) => Ok(GridFormat::Csv),
            (Some("base64"), None) | (Some("base64"), Some("")) => {
                Ok(GridFormat::Base64(Compression::None))
            }
            (Some("base64"), Some("zlib")) => Ok(GridFormat::Base64(Compression::Zlib)),
            (Some("base64"), Some("gzip")) => Ok(GridFormat::Base64(Compression::Gzip)),
            (encoding, compression) => Err(CodecError::UnsupportedEncoding(format!(
                "encoding={} compression={}",
                encoding.unwrap_or("<xml>"),
                compression.unwrap_or("<none>")
            ))),
        }
    }
}

impl fmt::Display for GridFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridFormat::Csv => write!(f, "csv"),
            GridFormat::Base64(Compression::None) => write!(f, "base64"),
            GridFormat::Base64(Compression::Zlib) => write!(f, "base64+zlib"),
            GridFormat::Base64(Compression::Gzip) => write!(f, "base64+gzip"),
        }
    }
}

/// Decodes a layer payload into a grid with rows of `width` cells.
///
/// Surrounding whitespace is ignored. Fails with
/// [`CodecError::MalformedGrid`] when the payload is not a whole number of
/// rows; no partial grid is ever returned.
pub fn decode(text: &str, width: usize, format: GridFormat) -> Result<Grid, CodecError> {
    if width == 0 {
        return Err(CodecError::MalformedGrid("row width is 0".to_string()));
    }

    let cells = match format {
        GridFormat::Csv => decode_csv(text)?,
        GridFormat::Base64(compression) => {
            let packed = BASE64_STANDARD.decode(text.trim())?;
            let raw = inflate(&packed, compression)?;
            cells_from_bytes(&raw)?
        }
    };

    if cells.len() % width != 0 {
        return Err(CodecError::MalformedGrid(format!(
            "{} cells cannot be split into rows of {}",
            cells.len(),
            width
        )));
    }

    Ok(Grid::from_cells(width, cells))
}

/// Encodes a grid in the given format. The result carries no surrounding whitespace.
pub fn encode(grid: &Grid, format: GridFormat) -> Result<String, CodecError> {
    match format {
        GridFormat::Csv => Ok(encode_csv(grid)),
        GridFormat::Base64(compression) => {
            let mut raw = Vec::with_capacity(grid.cells().len() * CELL_BYTES);
            for cell in grid.cells() {
                raw.extend_from_slice(&cell.0.to_le_bytes());
            }
            let packed = deflate(&raw, compression)?;
            Ok(BASE64_STANDARD.encode(packed))
        }
    }
}

fn cells_from_bytes(raw: &[u8]) -> Result<Vec<TileRef>, CodecError> {
    if raw.len() % CELL_BYTES != 0 {
        return Err(CodecError::MalformedGrid(format!(
            "payload length {} not divisible by {}",
            raw.len(),
            CELL_BYTES
        )));
    }
    Ok(raw
        .chunks_exact(CELL_BYTES)
        .map(|b| TileRef(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect())
}

fn inflate(packed: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::new();
    match compression {
        Compression::None => raw.extend_from_slice(packed),
        Compression::Zlib => {
            ZlibDecoder::new(packed)
                .read_to_end(&mut raw)
                .map_err(CodecError::Inflate)?;
        }
        Compression::Gzip => {
            GzDecoder::new(packed)
                .read_to_end(&mut raw)
                .map_err(CodecError::Inflate)?;
        }
    }
    Ok(raw)
}

fn deflate(raw: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
    let level = flate2::Compression::default();
    match compression {
        Compression::None => Ok(raw.to_vec()),
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            encoder.write_all(raw).map_err(CodecError::Deflate)?;
            encoder.finish().map_err(CodecError::Deflate)
        }
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(raw).map_err(CodecError::Deflate)?;
            encoder.finish().map_err(CodecError::Deflate)
        }
    }
}

/// Only the field after a final trailing comma may be empty.
fn decode_csv(text: &str) -> Result<Vec<TileRef>, CodecError> {
    let mut fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            if s.is_empty() {
                return Err(CodecError::InvalidCsv(format!("<empty field {}>", i + 1)));
            }
            s.parse::<u32>()
                .map(TileRef)
                .map_err(|_| CodecError::InvalidCsv(s.to_string()))
        })
        .collect()
}

fn encode_csv(grid: &Grid) -> String {
    grid.rows()
        .map(|row| {
            row.iter()
                .map(|r| r.0.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(",\n")
}
