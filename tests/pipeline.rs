use std::fs;
use std::path::Path;

use image::{imageops, ImageBuffer, Rgba, RgbaImage};
use tempfile::tempdir;

use tile_remap::batch::{collect_level_files, run_batch, BatchConfig};
use tile_remap::graphics::review::ReviewMetadata;
use tile_remap::remap::executor;
use tile_remap::remap::migration::{prepare_migration, MigrationConfig};
use tile_remap::remap::pattern::load_pattern_pair;
use tile_remap::tiled::{LevelDocument, TileRef};

const PATTERN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="2" height="2" tilewidth="16" tileheight="16">
 <layer id="1" name="stone" width="2" height="2">
  <data encoding="csv">
5,0,
0,7
</data>
 </layer>
 <layer id="2" name="wood" width="2" height="2">
  <data encoding="csv">
105,0,
0,107
</data>
 </layer>
</map>
"#;

fn level(ground: &str, deco: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="3" height="1" tilewidth="16" tileheight="16">
 <layer id="1" name="ground" width="3" height="1">
  <data encoding="csv">
{}
</data>
 </layer>
 <layer id="2" name="deco" width="3" height="1">
  <data encoding="csv">
{}
</data>
 </layer>
 <objectgroup id="3" name="spawns"/>
</map>
"#,
        ground, deco
    )
}

fn cells(path: &Path, layer: usize) -> Vec<u32> {
    let doc = LevelDocument::load(path).unwrap();
    doc.tile_grid(layer).unwrap().cells().iter().map(|r| r.0).collect()
}

fn tile(seed: u8) -> RgbaImage {
    ImageBuffer::from_fn(2, 2, |x, y| Rgba([seed, 10 + x as u8, 20 + y as u8, 255]))
}

/// Writes a 3x3 sheet of 2px tiles
fn write_sheet(path: &Path, tiles: &[RgbaImage]) {
    let mut image = RgbaImage::new(6, 6);
    for (i, t) in tiles.iter().enumerate() {
        let (x, y) = ((i as i64 % 3) * 2, (i as i64 / 3) * 2);
        imageops::replace(&mut image, t, x, y);
    }
    image.save(path).unwrap();
}

#[test]
fn pattern_remap_swaps_skins_per_layer() {
    let dir = tempdir().unwrap();
    let pattern = dir.path().join("stone_wood.tmx");
    fs::write(&pattern, PATTERN).unwrap();

    let levels = dir.path().join("levels");
    fs::create_dir(&levels).unwrap();
    let flipped_five = TileRef(5).flip().0;
    let stone = levels.join("a01.tmx");
    let wood = levels.join("a02.tmx");
    fs::write(&stone, level(&format!("5,{},7", flipped_five), "1,2,3")).unwrap();
    fs::write(&wood, level("105,107,0", "1,2,3")).unwrap();

    let table = load_pattern_pair(&pattern).unwrap();
    let files = collect_level_files(&[levels], None).unwrap();
    let config = BatchConfig {
        real_run: true,
        ..Default::default()
    };
    let report = run_batch(&files, &config, "remap", |doc| {
        Ok(executor::apply(&table, doc)?.edits)
    });

    assert!(report.is_success());
    assert_eq!(report.written, 2);
    assert_eq!(cells(&stone, 0), vec![105, TileRef(105).flip().0, 107]);
    assert_eq!(cells(&wood, 0), vec![5, 7, 0]);
    assert_eq!(cells(&stone, 1), vec![1, 2, 3]);

    let text = fs::read_to_string(&stone).unwrap();
    assert!(text.contains(r#"<objectgroup id="3" name="spawns"/>"#));
    assert!(text.contains("<data encoding=\"csv\">\n1,2,3\n</data>"));
}

#[test]
fn simulated_remap_leaves_files_untouched() {
    let dir = tempdir().unwrap();
    let pattern = dir.path().join("pattern.tmx");
    let path = dir.path().join("b01.tmx");
    fs::write(&pattern, PATTERN).unwrap();
    let original = level("5,5,7", "0,0,0");
    fs::write(&path, &original).unwrap();

    let table = load_pattern_pair(&pattern).unwrap();
    let report = run_batch(&[path.clone()], &BatchConfig::default(), "remap", |doc| {
        Ok(executor::apply(&table, doc)?.edits)
    });

    assert_eq!(report.changed, 1);
    assert_eq!(report.written, 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn migration_rebinds_moved_tiles_and_reports_misses() {
    let dir = tempdir().unwrap();
    let old_tiles: Vec<RgbaImage> = (1..=9).map(tile).collect();
    let mut new_tiles = old_tiles.clone();
    // editor ids 2 and 8 swap places, id 0 is redrawn
    new_tiles.swap(2, 8);
    new_tiles[0] = tile(200);

    let old_sheet = dir.path().join("old.png");
    let new_sheet = dir.path().join("new.png");
    write_sheet(&old_sheet, &old_tiles);
    write_sheet(&new_sheet, &new_tiles);

    let review_dir = dir.path().join("review");
    let config = MigrationConfig {
        tile_size: 2,
        review_dir: Some(review_dir.clone()),
        ..Default::default()
    };
    let (migration, artifacts) = prepare_migration(&config, &old_sheet, &new_sheet, None).unwrap();

    assert_eq!(migration.report.unmatched.iter().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(migration.table.forward().get(&TileRef(3)), Some(&TileRef(9)));
    assert_eq!(migration.table.forward().get(&TileRef(9)), Some(&TileRef(3)));

    assert!(artifacts.unmatched_sheet.as_deref().unwrap().exists());
    assert!(artifacts.overrides_sheet.is_none());
    let metadata: ReviewMetadata =
        serde_json::from_str(&fs::read_to_string(artifacts.metadata.unwrap()).unwrap()).unwrap();
    assert_eq!(metadata.unmatched, vec![0]);

    let path = dir.path().join("c01.tmx");
    fs::write(&path, level("3,4,0", "1,9,0")).unwrap();
    let batch = BatchConfig {
        real_run: true,
        ..Default::default()
    };
    let report = run_batch(&[path.clone()], &batch, "migrate", |doc| {
        Ok(executor::apply(&migration.table, doc)?.edits)
    });

    assert!(report.is_success());
    assert_eq!(cells(&path, 0), vec![9, 4, 0]);
    // unmatched tile 1 passes through
    assert_eq!(cells(&path, 1), vec![1, 3, 0]);
}

#[test]
fn overrides_file_feeds_the_review_sheet() {
    let dir = tempdir().unwrap();
    let old_tiles: Vec<RgbaImage> = (1..=9).map(tile).collect();
    let mut new_tiles = old_tiles.clone();
    new_tiles[4] = tile(250);

    let old_sheet = dir.path().join("old.png");
    let new_sheet = dir.path().join("new.png");
    let overrides = dir.path().join("overrides.json");
    write_sheet(&old_sheet, &old_tiles);
    write_sheet(&new_sheet, &new_tiles);
    fs::write(&overrides, r#"{"4": 6}"#).unwrap();

    let config = MigrationConfig {
        tile_size: 2,
        review_dir: Some(dir.path().join("review")),
        optimise_png: false,
        ..Default::default()
    };
    let (migration, artifacts) =
        prepare_migration(&config, &old_sheet, &new_sheet, Some(&overrides)).unwrap();

    assert!(migration.report.unmatched.is_empty());
    assert_eq!(migration.report.overridden, vec![(5, 7)]);
    assert_eq!(migration.table.forward().get(&TileRef(5)), Some(&TileRef(7)));
    assert!(artifacts.overrides_sheet.as_deref().unwrap().exists());
    assert!(artifacts.unmatched_sheet.is_none());
}

#[test]
fn malformed_levels_are_reported_and_skipped() {
    let dir = tempdir().unwrap();
    let pattern = dir.path().join("pattern.tmx");
    fs::write(&pattern, PATTERN).unwrap();
    let broken = dir.path().join("d01.tmx");
    let good = dir.path().join("d02.tmx");
    fs::write(&broken, level("5,5", "0,0,0")).unwrap();
    fs::write(&good, level("5,0,0", "0,0,0")).unwrap();

    let table = load_pattern_pair(&pattern).unwrap();
    let files = collect_level_files(&[dir.path().to_path_buf()], Some("d")).unwrap();
    let config = BatchConfig {
        real_run: true,
        ..Default::default()
    };
    let report = run_batch(&files, &config, "remap", |doc| {
        Ok(executor::apply(&table, doc)?.edits)
    });

    assert_eq!(report.processed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file, "d01");
    assert_eq!(cells(&good, 0), vec![105, 0, 0]);
}
