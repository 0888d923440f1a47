//! Config files and local material exports on disk

use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;
use snh_common::events::EventBus;
use snh_common::{JsonFileRepository, MaterialQuery};
use snh_player::media::headless::HeadlessBackend;
use snh_player::playback::CascataEngine;
use snh_player::{Error, PlayerConfig};
use tempfile::NamedTempFile;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_cli_path() {
    let file = write_temp(
        r#"
        [logging]
        level = "debug"

        [repository]
        table = "materiais"
        categories = ["sonhos"]

        [cascata]
        durations = [22.0, 24.0]
        "#,
    );

    let config = PlayerConfig::load(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.repository.table, "materiais");
    assert_eq!(config.repository.categories, vec!["sonhos".to_string()]);
    assert_eq!(config.cascata.durations, vec![22.0, 24.0]);
    assert_eq!(config.remix, Default::default());
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlayerConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, PlayerConfig::default());
}

#[test]
fn test_invalid_preset_rejected_on_load() {
    let file = write_temp(
        r#"
        [remix]
        crossfade_at = 0.0
        "#,
    );
    let result = PlayerConfig::load(Some(file.path().to_path_buf()));
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn test_engine_loads_local_export() {
    let export = write_temp(
        r#"{
            "materiais": [
                {"id": "a", "status": "approved", "category": "sonhos",
                 "video_path": "a.mp4", "image_path": "a.png"},
                {"id": "b", "status": "approved", "category": "legacy",
                 "video_path": "b.mp4"},
                {"id": "c", "status": "pending", "category": "sonhos",
                 "video_path": "c.mp4"}
            ]
        }"#,
    );
    let repo = JsonFileRepository::new(export.path());
    let mut engine = CascataEngine::new(
        HeadlessBackend::default(),
        Default::default(),
        (1600.0, 900.0),
        EventBus::default(),
        StdRng::seed_from_u64(1),
    );

    let query = MaterialQuery::approved().with_categories(["sonhos"]);
    let count = engine.load_materials(&repo, &query).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(engine.materials()[0].external_id, "a");
}
