//! Map editor level format: tile references, grids, the layer payload codec
//! and the XML document that holds them.

pub mod codec;
pub mod document;
pub mod grid;
pub mod tile_ref;

pub use codec::{Compression, GridFormat};
pub use document::{write_document, LayerEdits, LevelDocument, TileLayer};
pub use grid::Grid;
pub use tile_ref::TileRef;
