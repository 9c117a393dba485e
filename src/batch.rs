//! Sequential batch processing over a folder of levels.
//!
//! Each file is read, parsed, handed to an operation and, on a real run,
//! written back if the operation produced edits. A failing file is recorded
//! and the batch moves on to the next one.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{ConfigError, RemapError};
use crate::progress::write_progress;
use crate::tiled::{write_document, LayerEdits, LevelDocument};

const LEVEL_EXTENSIONS: [&str; 2] = ["tmx", "xml"];

#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Simulated runs never write
    pub real_run: bool,
    pub progress_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub changed: usize,
    pub written: usize,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Expands directories to the level files directly inside them, sorted by
/// name, and applies the prefix filter.
pub fn collect_level_files(paths: &[PathBuf], prefix: Option<&str>) -> Result<Vec<PathBuf>, RemapError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_level_file(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    if let Some(prefix) = prefix {
        info!("Narrowing selection to prefix '{}'", prefix);
        files.retain(|p| file_stem(p).starts_with(prefix));
    }

    if files.is_empty() {
        let shown = paths.first().cloned().unwrap_or_default();
        return Err(ConfigError::NoLevels(shown).into());
    }
    Ok(files)
}

fn is_level_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| LEVEL_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs `op` over every file in order.
///
/// `op` receives the parsed document and returns the payload edits it wants.
/// The document is rendered and written only when edits exist and the run is real.
pub fn run_batch<F>(files: &[PathBuf], config: &BatchConfig, phase: &str, mut op: F) -> BatchReport
where
    F: FnMut(&LevelDocument) -> Result<LayerEdits, RemapError>,
{
    let mut report = BatchReport::default();
    let total = files.len();

    for (i, path) in files.iter().enumerate() {
        info!("[{}/{}] {} {}", i + 1, total, phase, path.display());

        match process_file(path, config, &mut op) {
            Ok(FileResult::Unchanged) => {}
            Ok(FileResult::Changed { written }) => {
                report.changed += 1;
                if written {
                    report.written += 1;
                }
            }
            Err(e) => {
                debug!("{} failed: {:?}", path.display(), e);
                report.failures.push(FileFailure {
                    file: file_stem(path),
                    message: e.to_string(),
                });
            }
        }
        report.processed += 1;

        if let Some(progress_path) = config.progress_path.as_deref() {
            write_progress(progress_path, i + 1, total, phase, "running");
        }
    }

    if let Some(progress_path) = config.progress_path.as_deref() {
        write_progress(progress_path, total, total, phase, "complete");
    }
    report
}

enum FileResult {
    Unchanged,
    Changed { written: bool },
}

fn process_file<F>(path: &Path, config: &BatchConfig, op: &mut F) -> Result<FileResult, RemapError>
where
    F: FnMut(&LevelDocument) -> Result<LayerEdits, RemapError>,
{
    let document = LevelDocument::load(path)?;
    let edits = op(&document)?;
    if edits.is_empty() {
        return Ok(FileResult::Unchanged);
    }

    let text = document.render(&edits)?;
    if config.real_run {
        write_document(path, &text)?;
        debug!("Flushed {} layer(s) to {}", edits.len(), path.display());
    }
    Ok(FileResult::Changed {
        written: config.real_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::executor;
    use crate::remap::{expand_closure, CorrespondenceTable};
    use crate::tiled::TileRef;
    use std::fs;
    use tempfile::tempdir;

    const LEVEL: &str = r#"<map width="2" height="1"><layer name="ground" width="2" height="1"><data encoding="csv">3,4</data></layer></map>"#;

    fn table() -> CorrespondenceTable {
        CorrespondenceTable::Directional {
            forward: expand_closure(&[(TileRef(3), TileRef(9))]),
        }
    }

    #[test]
    fn collects_sorted_levels_matching_prefix() {
        let dir = tempdir().unwrap();
        for name in ["b01.tmx", "a02.tmx", "a01.xml", "notes.txt"] {
            fs::write(dir.path().join(name), LEVEL).unwrap();
        }

        let all = collect_level_files(&[dir.path().to_path_buf()], None).unwrap();
        let names: Vec<_> = all.iter().map(|p| file_stem(p)).collect();
        assert_eq!(names, vec!["a01", "a02", "b01"]);

        let only_a = collect_level_files(&[dir.path().to_path_buf()], Some("a0")).unwrap();
        assert_eq!(only_a.len(), 2);

        assert!(matches!(
            collect_level_files(&[dir.path().to_path_buf()], Some("z")),
            Err(RemapError::Config(ConfigError::NoLevels(_)))
        ));
    }

    #[test]
    fn simulated_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a01.tmx");
        fs::write(&path, LEVEL).unwrap();

        let table = table();
        let report = run_batch(&[path.clone()], &BatchConfig::default(), "remap", |doc| {
            Ok(executor::apply(&table, doc)?.edits)
        });

        assert_eq!(report.processed, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(report.written, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), LEVEL);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("a01.tmx");
        let good = dir.path().join("a02.tmx");
        let progress = dir.path().join("progress.json");
        fs::write(&broken, r#"<map><layer name="x" width="3" height="1"><data encoding="csv">1,2</data></layer></map>"#).unwrap();
        fs::write(&good, LEVEL).unwrap();

        let config = BatchConfig {
            real_run: true,
            progress_path: Some(progress.clone()),
        };
        let table = table();
        let report = run_batch(&[broken, good.clone()], &config, "remap", |doc| {
            Ok(executor::apply(&table, doc)?.edits)
        });

        assert_eq!(report.processed, 2);
        assert_eq!(report.written, 1);
        assert!(!report.is_success());
        assert_eq!(report.failures[0].file, "a01");
        assert!(fs::read_to_string(&good).unwrap().contains(">9,4<"));

        let status: serde_json::Value = serde_json::from_str(&fs::read_to_string(progress).unwrap()).unwrap();
        assert_eq!(status["status"], "complete");
        assert_eq!(status["current"], 2);
    }
}
