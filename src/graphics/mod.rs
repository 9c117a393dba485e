//! Tilesheet images: slicing and hashing for migrations, and the contact
//! sheets written for operator review.

pub mod font;
pub mod review;
pub mod tilesheet;

pub use tilesheet::{Tilesheet, DEFAULT_TILE_SIZE};
