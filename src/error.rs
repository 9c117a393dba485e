//! Error types shared across the pipeline.
//!
//! Each concern gets its own enum; `RemapError` is the umbrella returned by
//! the builders, the executor and the batch driver.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while decoding or encoding a layer's grid payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload does not describe a whole number of rows of 32-bit cells
    #[error("Malformed grid: {0}")]
    MalformedGrid(String),
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Decompression failed: {0}")]
    Inflate(#[source] io::Error),
    #[error("Compression failed: {0}")]
    Deflate(#[source] io::Error),
    #[error("Invalid CSV cell '{0}'")]
    InvalidCsv(String),
    #[error("Unsupported layer encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Errors raised while parsing or re-rendering a level document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML write error: {0}")]
    Write(#[from] io::Error),
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("<{element}> attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("Layer '{layer}': {source}")]
    Codec {
        layer: String,
        #[source]
        source: CodecError,
    },
    #[error("Document is not valid UTF-8 after rendering")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("No such layer index {0}")]
    NoSuchLayer(usize),
}

/// Fatal configuration problems. Nothing is built or written once one occurs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error in '{file}' detected! {reason}")]
    Pattern { file: String, reason: String },
    #[error("Migration source rejected: {0}")]
    Migration(String),
    #[error("Override bindings in '{file}': {reason}")]
    Overrides { file: String, reason: String },
    #[error("No level files found under {0}")]
    NoLevels(PathBuf),
}

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("PNG optimisation failed: {0}")]
    Png(String),
}

pub type Result<T, E = RemapError> = std::result::Result<T, E>;
