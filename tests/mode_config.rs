//! Mode record lifecycle against a real (temporary) filesystem.

use modekeeper::config::{CoordinatorPaths, ModeConfig, ModeRecord, StoreMode};
use modekeeper::errors::CoordinatorError;
use tempfile::TempDir;

fn paths(dir: &TempDir) -> CoordinatorPaths {
    CoordinatorPaths::new(dir.path())
}

#[test]
fn record_round_trip_preserves_launch_command() {
    let dir = TempDir::new().unwrap();
    let p = paths(&dir);
    let config = ModeConfig::new(&p);

    let record = ModeRecord::new(StoreMode::Persistent, true, "operator", &p);
    config.save(&record).unwrap();

    let loaded = config.load().unwrap();
    assert_eq!(loaded.mode, StoreMode::Persistent);
    assert!(loaded.auto_unseal);
    assert_eq!(loaded.updated_by, "operator");
    assert!(loaded
        .launch_command
        .contains(&p.store_data_dir().display().to_string()));
}

#[test]
fn missing_record_is_not_configured() {
    let dir = TempDir::new().unwrap();
    let config = ModeConfig::new(&paths(&dir));
    assert!(matches!(config.load().unwrap_err(), CoordinatorError::NotConfigured));
}

#[test]
fn save_leaves_no_staging_file_behind() {
    let dir = TempDir::new().unwrap();
    let p = paths(&dir);
    let config = ModeConfig::new(&p);

    config.save(&ModeRecord::new(StoreMode::Ephemeral, false, "operator", &p)).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["mode.json".to_string()]);
}

#[test]
fn saved_record_is_valid_json_with_stable_fields() {
    let dir = TempDir::new().unwrap();
    let p = paths(&dir);
    ModeConfig::new(&p)
        .save(&ModeRecord::new(StoreMode::Ephemeral, true, "operator", &p))
        .unwrap();

    let raw = std::fs::read_to_string(p.mode_file()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["mode"], "ephemeral");
    assert_eq!(parsed["auto_unseal"], true);
    assert_eq!(parsed["launch_command"], "store server --storage=inmem");
    assert!(parsed["updated_at"].is_string());
}

#[test]
fn truncated_record_fails_loudly_not_silently() {
    let dir = TempDir::new().unwrap();
    let p = paths(&dir);
    let config = ModeConfig::new(&p);
    config.save(&ModeRecord::new(StoreMode::Persistent, true, "operator", &p)).unwrap();

    // Simulate a torn write from some other tool.
    let raw = std::fs::read_to_string(p.mode_file()).unwrap();
    std::fs::write(p.mode_file(), &raw[..raw.len() / 2]).unwrap();

    assert!(matches!(config.load().unwrap_err(), CoordinatorError::Serialization { .. }));
}
