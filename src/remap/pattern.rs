//! Remap tables from a painted pattern pair.
//!
//! A pattern document holds exactly two tile layers of the same size and no
//! object layers. The first layer is the "before" skin, the second the
//! "after" skin. Every cell painted on both layers becomes one base pair; the
//! artist only paints one orientation and closure expansion derives the rest.

use std::collections::HashSet;
use std::path::Path;

use log::info;

use crate::error::{ConfigError, RemapError};
use crate::tiled::LevelDocument;

use super::{expand_closure, CorrespondenceTable};

pub fn load_pattern_pair(path: &Path) -> Result<CorrespondenceTable, RemapError> {
    let document = LevelDocument::load(path)?;
    build_from_pattern_pair(&document)
}

pub fn build_from_pattern_pair(document: &LevelDocument) -> Result<CorrespondenceTable, RemapError> {
    validate_pattern(document)?;

    let before = document.tile_grid(0)?;
    let after = document.tile_grid(1)?;

    let mut forward_pairs = Vec::new();
    let mut backward_pairs = Vec::new();
    for (&a, &b) in before.cells().iter().zip(after.cells()) {
        if a.is_empty() || b.is_empty() {
            continue;
        }
        forward_pairs.push((a, b));
        backward_pairs.push((b, a));
    }

    let forward = expand_closure(&forward_pairs);
    let backward = expand_closure(&backward_pairs);
    info!(
        "Pattern '{}': {} painted pairs, {} forward and {} backward bindings",
        document.name(),
        forward_pairs.len(),
        forward.len(),
        backward.len()
    );

    Ok(CorrespondenceTable::Bidirectional { forward, backward })
}

/// Mandates two equal-sized tile layers with distinct names and no object groups.
fn validate_pattern(document: &LevelDocument) -> Result<(), ConfigError> {
    let fail = |reason: String| ConfigError::Pattern {
        file: document.name().to_string(),
        reason,
    };

    if !document.object_groups().is_empty() {
        return Err(fail("There should be no object layers!".to_string()));
    }

    let layers = document.layers();
    if layers.len() != 2 {
        return Err(fail(format!(
            "Number of tile layers must be 2, found {}!",
            layers.len()
        )));
    }

    let mut names = HashSet::new();
    if let Some(duplicate) = layers.iter().find(|l| !names.insert(l.name.as_str())) {
        return Err(fail(format!("Duplicate layer name '{}'!", duplicate.name)));
    }

    let (a, b) = (&layers[0], &layers[1]);
    if (a.width, a.height) != (b.width, b.height) {
        return Err(fail(format!(
            "Layers '{}' ({}x{}) and '{}' ({}x{}) differ in size!",
            a.name, a.width, a.height, b.name, b.width, b.height
        )));
    }

    Ok(())
}
