use std::{fs, path::Path};

use log::warn;
use serde::Serialize;

#[derive(Serialize)]
struct Progress<'a> {
    current: usize,
    total: usize,
    phase: &'a str,
    status: &'a str,
}

/// Overwrites the progress file with the current position in a batch.
/// Failures are logged and otherwise ignored; progress is informational only.
pub fn write_progress(path: &Path, current: usize, total: usize, phase: &str, status: &str) {
    let progress = Progress {
        current,
        total,
        phase,
        status,
    };
    let result = serde_json::to_string(&progress)
        .map_err(|e| e.to_string())
        .and_then(|json| fs::write(path, json).map_err(|e| e.to_string()));
    if let Err(e) = result {
        warn!("Could not write progress to {}: {}", path.display(), e);
    }
}
