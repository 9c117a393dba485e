use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, LevelFilter};

use tile_remap::batch::{collect_level_files, run_batch, BatchConfig, BatchReport};
use tile_remap::error::RemapError;
use tile_remap::graphics::DEFAULT_TILE_SIZE;
use tile_remap::remap::executor;
use tile_remap::remap::migration::{prepare_migration, MigrationConfig, UnmatchedPolicy};
use tile_remap::remap::pattern::load_pattern_pair;
use tile_remap::remap::search::find_tiles;
use tile_remap::tiled::{LayerEdits, LevelDocument, TileRef};

#[derive(Parser)]
#[command(name = "tile_remap", version, about = "Batch tile remapping for map editor levels")]
struct Cli {
    /// 0 = warnings only, 1 = per-file progress, 2 = per-layer detail
    #[arg(short, long, global = true, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    verbosity: u8,

    /// JSON file overwritten with batch progress after every level
    #[arg(long, global = true)]
    progress_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct BatchArgs {
    /// Write changes back; without this flag the run is simulated
    #[arg(long)]
    real_run: bool,

    /// Only process levels whose file name starts with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Level files or folders of levels
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Swap tile skins using a painted before/after pattern pair
    Remap {
        #[arg(long)]
        pattern: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Rebind levels from an old tilesheet layout to a new one
    Migrate {
        #[arg(long)]
        old_sheet: PathBuf,

        #[arg(long)]
        new_sheet: PathBuf,

        /// JSON object of 0-based old -> new tile ids
        #[arg(long)]
        overrides: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
        tile_size: u32,

        /// Bind tiles with no match to the empty tile instead of keeping them
        #[arg(long)]
        zero_unmatched: bool,

        /// Folder for the unmatched/overridden contact sheets
        #[arg(long)]
        review_dir: Option<PathBuf>,

        /// Skip the PNG optimisation pass on review sheets
        #[arg(long)]
        no_optimise: bool,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// List every cell holding a tile, in any orientation
    Find {
        /// 0-based tile id as shown by the map editor
        tile_id: u32,

        #[arg(long)]
        prefix: Option<String>,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every level was processed without error
fn run(cli: Cli) -> Result<bool, RemapError> {
    match cli.command {
        Command::Remap { pattern, batch } => {
            let table = load_pattern_pair(&pattern)?;
            println!(
                "Pattern {}: {} bindings each way",
                pattern.display(),
                table.forward().len()
            );

            let (files, config) = batch_setup(batch, cli.progress_file)?;
            let report = run_batch(&files, &config, "remap", |doc| remap_level(&table, doc));
            Ok(summarise(&report, config.real_run))
        }
        Command::Migrate {
            old_sheet,
            new_sheet,
            overrides,
            tile_size,
            zero_unmatched,
            review_dir,
            no_optimise,
            batch,
        } => {
            let migration_config = MigrationConfig {
                tile_size,
                unmatched_policy: if zero_unmatched {
                    UnmatchedPolicy::Zero
                } else {
                    UnmatchedPolicy::PassThrough
                },
                review_dir,
                optimise_png: !no_optimise,
            };
            let (migration, artifacts) =
                prepare_migration(&migration_config, &old_sheet, &new_sheet, overrides.as_deref())?;

            let report = &migration.report;
            println!(
                "Migration table: {} matched, {} overridden, {} reoriented, {} unmatched",
                report.matched,
                report.overridden.len(),
                report.reoriented.len(),
                report.unmatched.len()
            );
            if !report.unmatched.is_empty() {
                let ids: Vec<String> = report.unmatched.iter().map(|i| (i - 1).to_string()).collect();
                println!("Unmatched tile ids: {}", ids.join(", "));
            }
            for (old, new) in &report.overridden {
                println!("Override: {} -> {}", old - 1, new - 1);
            }
            for path in [&artifacts.unmatched_sheet, &artifacts.overrides_sheet, &artifacts.metadata]
                .into_iter()
                .flatten()
            {
                println!("Review: {}", path.display());
            }

            let (files, config) = batch_setup(batch, cli.progress_file)?;
            let report = run_batch(&files, &config, "migrate", |doc| {
                remap_level(&migration.table, doc)
            });
            Ok(summarise(&report, config.real_run))
        }
        Command::Find {
            tile_id,
            prefix,
            paths,
        } => {
            let files = collect_level_files(&paths, prefix.as_deref())?;
            let targets = TileRef::from_editor_id(tile_id).permutations();
            let mut ok = true;
            let mut total = 0;

            for path in &files {
                let document = match LevelDocument::load(path) {
                    Ok(d) => d,
                    Err(e) => {
                        eprintln!("{}: {}", path.display(), e);
                        ok = false;
                        continue;
                    }
                };
                match find_tiles(&document, &targets) {
                    Ok(hits) => {
                        for hit in &hits {
                            println!("{} {} ({}, {}) {}", document.name(), hit.layer, hit.x, hit.y, hit.tile);
                        }
                        total += hits.len();
                    }
                    Err(e) => {
                        eprintln!("{}: {}", document.name(), e);
                        ok = false;
                    }
                }
            }

            println!("{} cells in {} levels", total, files.len());
            Ok(ok)
        }
    }
}

fn batch_setup(
    args: BatchArgs,
    progress_path: Option<PathBuf>,
) -> Result<(Vec<PathBuf>, BatchConfig), RemapError> {
    let files = collect_level_files(&args.paths, args.prefix.as_deref())?;
    let config = BatchConfig {
        real_run: args.real_run,
        progress_path,
    };
    if !config.real_run {
        println!("Simulated run, nothing will be written (pass --real-run to commit)");
    }
    Ok((files, config))
}

fn remap_level(
    table: &tile_remap::remap::CorrespondenceTable,
    document: &LevelDocument,
) -> Result<LayerEdits, RemapError> {
    let outcome = executor::apply(table, document)?;
    if !outcome.is_unchanged() {
        let layers = outcome.layers.iter().filter(|l| l.direction.is_some()).count();
        println!(
            "{}: {} cells across {} layer(s)",
            document.name(),
            outcome.changed_cells(),
            layers
        );
    }
    Ok(outcome.edits)
}

fn summarise(report: &BatchReport, real_run: bool) -> bool {
    println!(
        "{} levels processed, {} changed, {} written",
        report.processed,
        report.changed,
        if real_run { report.written } else { 0 }
    );
    if !report.failures.is_empty() {
        println!("Errored files:");
        for failure in &report.failures {
            println!("  {}: {}", failure.file, failure.message);
        }
    }
    report.is_success()
}
