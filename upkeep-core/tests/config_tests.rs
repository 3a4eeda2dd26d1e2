//! Config load/save integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use std::path::PathBuf;
use upkeep_core::{CoreError, UpdaterConfig};

#[test]
fn partial_yaml_keeps_defaults_for_missing_keys() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("upkeep.yaml")
        .write_str("remote: upstream\ntimeouts:\n  build: 30\n")
        .expect("write");

    let config = UpdaterConfig::load_at(root.path()).expect("load");
    assert_eq!(config.remote, "upstream");
    assert_eq!(config.fallback_remote, "origin");
    assert_eq!(config.timeouts.build, 30);
    assert_eq!(config.timeouts.fetch_tags, 60);
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("upkeep.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = UpdaterConfig::load_at(root.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("upkeep.yaml"));
}

#[test]
fn bad_version_pattern_is_rejected_on_load() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("upkeep.yaml")
        .write_str("version_pattern: '(unclosed'\n")
        .expect("write");

    let err = UpdaterConfig::load_at(root.path()).unwrap_err();
    assert!(matches!(err, CoreError::VersionPattern { .. }), "got: {err}");
}

#[test]
fn save_then_load_preserves_custom_values() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let config = UpdaterConfig {
        app_name: "Ledger".to_string(),
        build_dir: PathBuf::from("dist"),
        watched_files: vec![PathBuf::from("src/main.py")],
        ..UpdaterConfig::default()
    };
    config.save_at(root.path()).expect("save");

    root.child("upkeep.yaml")
        .assert(predicate::str::contains("app_name: Ledger"));
    let loaded = UpdaterConfig::load_at(root.path()).expect("load");
    assert_eq!(loaded, config);
}

#[cfg(unix)]
#[test]
fn saved_config_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let root = assert_fs::TempDir::new().expect("tempdir");
    let path = UpdaterConfig::default().save_at(root.path()).expect("save");
    let mode = std::fs::metadata(path).expect("meta").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
