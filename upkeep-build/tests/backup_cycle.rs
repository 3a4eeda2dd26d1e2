//! Backup → failed build → restore → package, against a real directory tree.

use std::fs::File;
use std::path::Path;

use tempfile::TempDir;
use upkeep_build::{package, validate, BackupManager, BuildError};
use upkeep_core::{UpdaterConfig, Version};

fn install(root: &Path, config: &UpdaterConfig, exe: &[u8]) {
    let build = config.build_dir_at(root);
    std::fs::create_dir_all(build.join("lib")).unwrap();
    std::fs::write(config.artifact_at(root), exe).unwrap();
    std::fs::write(build.join("lib/python3.dll"), b"dll").unwrap();
}

#[test]
fn broken_build_is_rolled_back_to_the_snapshot() {
    let root = TempDir::new().unwrap();
    let config = UpdaterConfig::default();
    install(root.path(), &config, b"MZ-0.2.2");

    let backups = BackupManager::new(config.backup_dir_at(root.path()), config.build_dir_at(root.path()));
    let backup = backups.create(&Version::new(0, 2, 2)).unwrap();

    // A build that died halfway: artifact truncated, junk left behind.
    std::fs::write(config.artifact_at(root.path()), b"").unwrap();
    std::fs::write(config.build_dir_at(root.path()).join("partial.o"), b"x").unwrap();
    assert!(matches!(
        validate::validate(&config.artifact_at(root.path())),
        Err(BuildError::ArtifactEmpty { .. })
    ));

    backups.restore(&backups.latest().unwrap().unwrap()).unwrap();
    assert_eq!(backup.version, Version::new(0, 2, 2));
    assert_eq!(std::fs::read(config.artifact_at(root.path())).unwrap(), b"MZ-0.2.2");
    assert!(!config.build_dir_at(root.path()).join("partial.o").exists());
}

#[test]
fn archive_is_named_after_the_version() {
    let root = TempDir::new().unwrap();
    let config = UpdaterConfig::default();
    install(root.path(), &config, b"MZ-0.2.3");

    let archive = config.archive_at(root.path(), &Version::new(0, 2, 3));
    let summary = package::package(&config.build_dir_at(root.path()), &archive).unwrap();

    assert_eq!(
        archive.file_name().unwrap().to_string_lossy(),
        "DocuReader-0.2.3-portable.zip"
    );
    assert_eq!(summary.files, 2);
    let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    assert!(zip.file_names().any(|n| n == "cx_freeze/DocuReader.exe"));
}
