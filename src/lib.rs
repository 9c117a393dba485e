pub mod batch;
pub mod error;
pub mod graphics;
pub mod progress;
pub mod remap;
pub mod tiled;
