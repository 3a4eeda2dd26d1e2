use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use upkeep_build::BackupManager;
use upkeep_core::{UpdaterConfig, Version};
use upkeep_session::SessionLock;

fn upkeep(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("upkeep"));
    cmd.arg("--root")
        .arg(root)
        .env("NO_COLOR", "1")
        .env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

fn install_build(root: &Path, exe: &[u8]) -> BackupManager {
    let config = UpdaterConfig::default();
    fs::create_dir_all(config.build_dir_at(root)).unwrap();
    fs::write(config.artifact_at(root), exe).unwrap();
    BackupManager::new(config.backup_dir_at(root), config.build_dir_at(root))
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(["-c", "user.name=upkeep", "-c", "user.email=upkeep@example.invalid"])
        .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
}

fn commit_version(dir: &Path, version: &str) {
    fs::write(dir.join("tr_gui.py"), format!("__version__ = \"{version}\"\n")).unwrap();
    git(dir, &["add", "tr_gui.py"]);
    git(dir, &["commit", "-q", "-m", &format!("release {version}")]);
    git(dir, &["tag", &format!("v{version}")]);
}

#[test]
fn help_lists_the_modes() {
    Command::new(assert_cmd::cargo::cargo_bin!("upkeep"))
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--check-only"))
        .stdout(contains("--rollback"))
        .stdout(contains("--allow-dirty"));
}

#[test]
fn modes_are_mutually_exclusive() {
    let root = TempDir::new().unwrap();
    upkeep(root.path())
        .args(["--check-only", "--rollback"])
        .assert()
        .failure();
}

#[test]
fn exit_code_flag_requires_check_only() {
    let root = TempDir::new().unwrap();
    upkeep(root.path()).arg("--exit-code").assert().failure();
}

#[test]
fn check_only_outside_a_repository_still_exits_zero() {
    let root = TempDir::new().unwrap();
    upkeep(root.path())
        .arg("--check-only")
        .assert()
        .code(0)
        .stdout(contains("[ERROR]"));
    let log = fs::read_to_string(root.path().join("update.log")).unwrap();
    assert!(log.contains("[ERROR]"));
}

#[test]
fn check_only_with_malformed_config_still_exits_zero_and_logs() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("upkeep.yaml"), "remote: [unclosed\n").unwrap();

    let out = upkeep(root.path()).arg("--check-only").output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[ERROR]"), "stdout was:\n{stdout}");
    assert!(stdout.contains("failed to load configuration"));
    assert_eq!(stdout.matches("failed to parse config at").count(), 1);

    let log = fs::read_to_string(root.path().join("update.log")).unwrap();
    assert!(log.contains("[ERROR]"), "log was:\n{log}");
    assert!(log.contains("failed to load configuration"));
}

#[test]
fn malformed_config_is_logged_before_failing() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("upkeep.yaml"), "remote: [unclosed\n").unwrap();
    upkeep(root.path()).arg("--rollback").assert().code(1);

    let log = fs::read_to_string(root.path().join("update.log")).unwrap();
    assert!(log.contains("[ERROR]"));
    assert!(log.contains("failed to load configuration"));
}

#[test]
fn rollback_without_backups_fails() {
    let root = TempDir::new().unwrap();
    upkeep(root.path())
        .arg("--rollback")
        .assert()
        .code(1)
        .stdout(contains("no backups available"));
}

#[test]
fn rollback_restores_the_latest_backup() {
    let root = TempDir::new().unwrap();
    let backups = install_build(root.path(), b"MZ-0.2.1");
    backups.create(&Version::new(0, 2, 1)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    fs::write(UpdaterConfig::default().artifact_at(root.path()), b"MZ-0.2.2").unwrap();
    backups.create(&Version::new(0, 2, 2)).unwrap();
    fs::write(UpdaterConfig::default().artifact_at(root.path()), b"MZ-broken").unwrap();

    upkeep(root.path())
        .arg("--rollback")
        .assert()
        .success()
        .stdout(contains("Rollback successful"))
        .stdout(contains("v0.2.2"));
    assert_eq!(
        fs::read(UpdaterConfig::default().artifact_at(root.path())).unwrap(),
        b"MZ-0.2.2"
    );
}

#[test]
fn rollback_is_refused_while_another_session_runs() {
    let root = TempDir::new().unwrap();
    let _held = SessionLock::acquire(root.path()).unwrap();
    upkeep(root.path())
        .arg("--rollback")
        .assert()
        .code(1)
        .stdout(contains("another update session"));
}

#[test]
fn list_backups_as_json() {
    let root = TempDir::new().unwrap();
    let backups = install_build(root.path(), b"MZ");
    backups.create(&Version::new(0, 2, 1)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    backups.create(&Version::new(0, 2, 2)).unwrap();

    let out = upkeep(root.path())
        .args(["--list-backups", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let versions: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, ["0.2.1", "0.2.2"]);
}

#[test]
fn list_backups_when_there_are_none() {
    let root = TempDir::new().unwrap();
    upkeep(root.path())
        .arg("--list-backups")
        .assert()
        .success()
        .stdout(contains("No backups found"));
}

#[test]
fn init_config_writes_defaults_once() {
    let root = TempDir::new().unwrap();
    upkeep(root.path())
        .arg("--init-config")
        .assert()
        .success()
        .stdout(contains("upkeep.yaml"));
    let written = fs::read_to_string(root.path().join("upkeep.yaml")).unwrap();
    assert!(written.contains("task_releaser"));
    assert_eq!(UpdaterConfig::load_at(root.path()).unwrap(), UpdaterConfig::default());

    upkeep(root.path())
        .arg("--init-config")
        .assert()
        .failure()
        .stdout(contains("already exists"));
}

#[test]
fn malformed_config_is_reported() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("upkeep.yaml"), "remote: [unclosed\n").unwrap();
    upkeep(root.path())
        .arg("--list-backups")
        .assert()
        .code(1)
        .stdout(contains("failed to load configuration"));
}

#[test]
fn declining_at_end_of_input_changes_nothing() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    git(upstream.path(), &["init", "-q"]);
    commit_version(upstream.path(), "0.2.2");
    let parent = TempDir::new().unwrap();
    git(
        parent.path(),
        &["clone", "-q", &upstream.path().to_string_lossy(), "work"],
    );
    commit_version(upstream.path(), "0.2.3");
    let work = parent.path().join("work");
    install_build(&work, b"MZ-0.2.2");

    upkeep(&work)
        .assert()
        .code(1)
        .stdout(contains("Update available: 0.2.3"))
        .stdout(contains("[CANCELLED]"));
    assert!(!work.join("backup").exists());
    assert_eq!(
        fs::read_to_string(work.join("tr_gui.py")).unwrap(),
        "__version__ = \"0.2.2\"\n"
    );
}

#[test]
fn check_only_exit_code_reports_latest_with_two() {
    if !git_available() {
        return;
    }
    let upstream = TempDir::new().unwrap();
    git(upstream.path(), &["init", "-q"]);
    commit_version(upstream.path(), "0.2.3");
    let parent = TempDir::new().unwrap();
    git(
        parent.path(),
        &["clone", "-q", &upstream.path().to_string_lossy(), "work"],
    );
    let work = parent.path().join("work");

    upkeep(&work)
        .args(["--check-only", "--exit-code"])
        .assert()
        .code(2)
        .stdout(contains("Already on latest version"));
    upkeep(&work)
        .arg("--check-only")
        .assert()
        .code(0)
        .stdout(contains("Already on latest version").and(contains("[OK]")));
}
