//! # Level Documents
//!
//! A level is the map editor's XML file: `<map>` holding `<layer>` elements
//! (each with one `<data>` payload), `<objectgroup>` elements and `<group>`
//! elements that nest either kind.
//!
//! Parsing keeps the original text. Tile payloads are replaced by streaming the
//! original events back through a writer, so everything that is not an edited
//! payload comes out exactly as it went in.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{CodecError, DocumentError, RemapError};

use super::codec::{self, GridFormat};
use super::grid::Grid;

/// One tile layer as found in the document
#[derive(Clone, Debug)]
pub struct TileLayer {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub format: GridFormat,
    /// Payload text exactly as stored, surrounding whitespace included
    pub data: String,
    /// Names of the `<group>` elements enclosing this layer, outermost first
    pub group_path: Vec<String>,
}

impl TileLayer {
    /// Wraps a fresh payload in the whitespace the original payload had
    fn wrap_payload(&self, payload: &str) -> String {
        let leading = &self.data[..self.data.len() - self.data.trim_start().len()];
        let trailing = &self.data[self.data.trim_end().len()..];
        if self.data.trim().is_empty() {
            return format!("{}{}", leading, payload);
        }
        format!("{}{}{}", leading, payload, trailing)
    }

    pub fn display_name(&self) -> String {
        if self.group_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.group_path.join("/"), self.name)
        }
    }
}

/// Replacement payloads keyed by layer position in [`LevelDocument::layers`]
pub type LayerEdits = BTreeMap<usize, String>;

#[derive(Debug)]
pub struct LevelDocument {
    name: String,
    source: String,
    pub width: usize,
    pub height: usize,
    layers: Vec<TileLayer>,
    object_groups: Vec<String>,
}

impl LevelDocument {
    pub fn load(path: &Path) -> Result<Self, RemapError> {
        let source = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::parse(name, source)?)
    }

    pub fn parse(name: impl Into<String>, source: String) -> Result<Self, DocumentError> {
        let scan = scan(&source)?;
        let name = name.into();
        debug!(
            "{}: {}x{} map, {} tile layers, {} object groups",
            name,
            scan.width,
            scan.height,
            scan.layers.len(),
            scan.object_groups.len()
        );
        Ok(LevelDocument {
            name,
            source,
            width: scan.width,
            height: scan.height,
            layers: scan.layers,
            object_groups: scan.object_groups,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn object_groups(&self) -> &[String] {
        &self.object_groups
    }

    /// Decodes one layer's payload using the layer's own declared format.
    pub fn tile_grid(&self, layer_index: usize) -> Result<Grid, DocumentError> {
        let layer = self
            .layers
            .get(layer_index)
            .ok_or(DocumentError::NoSuchLayer(layer_index))?;
        let codec_err = |source| DocumentError::Codec {
            layer: layer.display_name(),
            source,
        };

        let grid = codec::decode(&layer.data, layer.width, layer.format).map_err(codec_err)?;
        if grid.height() != layer.height {
            return Err(codec_err(CodecError::MalformedGrid(format!(
                "decoded {} rows, layer declares {}",
                grid.height(),
                layer.height
            ))));
        }
        Ok(grid)
    }

    /// Encodes a grid with the format the given layer was stored in.
    pub fn encode_for_layer(&self, layer_index: usize, grid: &Grid) -> Result<String, DocumentError> {
        let layer = self
            .layers
            .get(layer_index)
            .ok_or(DocumentError::NoSuchLayer(layer_index))?;
        codec::encode(grid, layer.format).map_err(|source| DocumentError::Codec {
            layer: layer.display_name(),
            source,
        })
    }

    /// Produces the document text with the given payloads swapped in.
    /// Without edits the original source is returned untouched.
    pub fn render(&self, edits: &LayerEdits) -> Result<String, DocumentError> {
        if edits.is_empty() {
            return Ok(self.source.clone());
        }
        if let Some(&bad) = edits.keys().find(|&&i| i >= self.layers.len()) {
            return Err(DocumentError::NoSuchLayer(bad));
        }

        let mut reader = Reader::from_str(&self.source);
        let mut writer = Writer::new(Vec::with_capacity(self.source.len()));
        let mut in_layer = false;
        let mut ordinal = 0usize;
        let mut state = DataState::Outside;

        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Eof => break,
                Event::Start(e) => match e.name().as_ref() {
                    b"layer" => in_layer = true,
                    b"data" if in_layer => {
                        state = match edits.get(&ordinal) {
                            Some(payload) => {
                                DataState::Pending(self.layers[ordinal].wrap_payload(payload))
                            }
                            None => DataState::Copying,
                        };
                    }
                    _ => {}
                },
                Event::Empty(e) if in_layer && e.name().as_ref() == b"data" => ordinal += 1,
                Event::Text(_) | Event::CData(_) => match std::mem::replace(&mut state, DataState::Outside) {
                    DataState::Pending(text) => {
                        writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
                        state = DataState::Written;
                        continue;
                    }
                    DataState::Written => {
                        state = DataState::Written;
                        continue;
                    }
                    other => state = other,
                },
                Event::End(e) => match e.name().as_ref() {
                    b"layer" => in_layer = false,
                    b"data" if !matches!(state, DataState::Outside) => {
                        if let DataState::Pending(text) =
                            std::mem::replace(&mut state, DataState::Outside)
                        {
                            writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
                        }
                        ordinal += 1;
                    }
                    _ => {}
                },
                _ => {}
            }
            writer.write_event(event)?;
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }
}

/// Writes rendered document text back to disk. The terminal step of a file's
/// processing, kept apart from [`LevelDocument::render`] so runs can be simulated.
pub fn write_document(path: &Path, text: &str) -> Result<(), RemapError> {
    fs::write(path, text)?;
    Ok(())
}

enum DataState {
    Outside,
    Copying,
    Pending(String),
    Written,
}

struct Scan {
    width: usize,
    height: usize,
    layers: Vec<TileLayer>,
    object_groups: Vec<String>,
}

struct LayerHeader {
    name: String,
    width: usize,
    height: usize,
}

struct OpenData {
    format: GridFormat,
    text: String,
}

fn scan(source: &str) -> Result<Scan, DocumentError> {
    let mut reader = Reader::from_str(source);
    let mut scan = Scan {
        width: 0,
        height: 0,
        layers: Vec::new(),
        object_groups: Vec::new(),
    };
    let mut groups: Vec<String> = Vec::new();
    let mut header: Option<LayerHeader> = None;
    let mut open: Option<OpenData> = None;
    // Tiles of an embedded tileset carry their own collision object groups
    let mut tileset_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => match e.name().as_ref() {
                b"map" => {
                    scan.width = dimension(&e, "map", "width")?;
                    scan.height = dimension(&e, "map", "height")?;
                }
                b"group" => groups.push(attribute(&e, b"name")?.unwrap_or_default()),
                b"layer" => header = Some(layer_header(&e)?),
                b"tileset" => tileset_depth += 1,
                b"objectgroup" if tileset_depth == 0 => scan
                    .object_groups
                    .push(attribute(&e, b"name")?.unwrap_or_default()),
                b"data" if header.is_some() => {
                    open = Some(OpenData {
                        format: data_format(&e, &header)?,
                        text: String::new(),
                    })
                }
                b"chunk" | b"tile" if open.is_some() => {
                    return Err(unsupported_payload(&header, "nested elements in <data>"))
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"objectgroup" if tileset_depth == 0 => scan
                    .object_groups
                    .push(attribute(&e, b"name")?.unwrap_or_default()),
                b"data" => {
                    if let Some(h) = header.as_ref() {
                        scan.layers.push(TileLayer {
                            name: h.name.clone(),
                            width: h.width,
                            height: h.height,
                            format: data_format(&e, &header)?,
                            data: String::new(),
                            group_path: groups.clone(),
                        });
                    }
                }
                b"chunk" | b"tile" if open.is_some() => {
                    return Err(unsupported_payload(&header, "nested elements in <data>"))
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(data) = open.as_mut() {
                    data.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(data) = open.as_mut() {
                    data.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"data" => {
                    if let (Some(h), Some(data)) = (header.as_ref(), open.take()) {
                        scan.layers.push(TileLayer {
                            name: h.name.clone(),
                            width: h.width,
                            height: h.height,
                            format: data.format,
                            data: data.text,
                            group_path: groups.clone(),
                        });
                    }
                }
                b"layer" => header = None,
                b"tileset" => tileset_depth = tileset_depth.saturating_sub(1),
                b"group" => {
                    groups.pop();
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok(scan)
}

fn unsupported_payload(header: &Option<LayerHeader>, what: &str) -> DocumentError {
    DocumentError::Codec {
        layer: header_name(header),
        source: CodecError::UnsupportedEncoding(what.to_string()),
    }
}

fn header_name(header: &Option<LayerHeader>) -> String {
    header.as_ref().map(|h| h.name.clone()).unwrap_or_default()
}

fn layer_header(e: &BytesStart) -> Result<LayerHeader, DocumentError> {
    Ok(LayerHeader {
        name: attribute(e, b"name")?.unwrap_or_default(),
        width: dimension(e, "layer", "width")?,
        height: dimension(e, "layer", "height")?,
    })
}

fn data_format(e: &BytesStart, header: &Option<LayerHeader>) -> Result<GridFormat, DocumentError> {
    let encoding = attribute(e, b"encoding")?;
    let compression = attribute(e, b"compression")?;
    GridFormat::from_attributes(encoding.as_deref(), compression.as_deref()).map_err(|source| {
        DocumentError::Codec {
            layer: header_name(header),
            source,
        }
    })
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, DocumentError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn dimension(
    e: &BytesStart,
    element: &'static str,
    attribute_name: &'static str,
) -> Result<usize, DocumentError> {
    let value = attribute(e, attribute_name.as_bytes())?.ok_or(DocumentError::MissingAttribute {
        element,
        attribute: attribute_name,
    })?;
    value
        .trim()
        .parse()
        .map_err(|_| DocumentError::InvalidAttribute {
            element,
            attribute: attribute_name,
            value,
        })
}
