//! Updater configuration.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   upkeep.yaml                 (optional; defaults apply when absent)
//!   update.log                  (append-only session log)
//!   backup/
//!     v<version>_backup_<ts>/   (one directory per snapshot)
//!   freeze_build/cx_freeze/     (build-output directory)
//! ```
//!
//! Every path in [`UpdaterConfig`] is relative to the installation root; the
//! `*_at(root)` helpers join them.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::types::Version;

/// File name looked up under the installation root.
pub const CONFIG_FILE: &str = "upkeep.yaml";

/// Subprocess deadlines, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub list_remotes: u64,
    pub list_branches: u64,
    pub fetch_tags: u64,
    pub fetch_branch: u64,
    pub rev_parse: u64,
    pub reset: u64,
    pub pull: u64,
    pub status: u64,
    pub diff: u64,
    pub describe: u64,
    pub build: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            list_remotes: 10,
            list_branches: 20,
            fetch_tags: 60,
            fetch_branch: 30,
            rev_parse: 15,
            reset: 60,
            pull: 60,
            status: 15,
            diff: 30,
            describe: 10,
            build: 600,
        }
    }
}

/// Everything the updater needs to know about one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Human name of the application, used in archive names and banners.
    pub app_name: String,
    /// Preferred remote; falls back to `fallback_remote`, then the first remote.
    pub remote: String,
    pub fallback_remote: String,
    /// Preferred branch; falls back to `fallback_branch`, then the first branch.
    pub branch: String,
    pub fallback_branch: String,
    /// Prefix that turns a version into its release tag (`v` → `v0.2.3`).
    pub tag_prefix: String,
    /// Source file carrying the embedded version string.
    pub version_file: PathBuf,
    /// Regex with one capture group around the version.
    pub version_pattern: String,
    /// Files whose change against the remote requires a rebuild.
    pub watched_files: Vec<PathBuf>,
    /// External build command; the first element is the program.
    pub build_command: Vec<String>,
    pub build_dir: PathBuf,
    /// Artifact expected inside `build_dir` after a successful build.
    pub artifact: PathBuf,
    pub backup_dir: PathBuf,
    pub log_file: PathBuf,
    pub build_log: PathBuf,
    /// Archive name template; `{app}` and `{version}` are substituted.
    pub archive_name: String,
    pub timeouts: Timeouts,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            app_name: "DocuReader".to_string(),
            remote: "task_releaser".to_string(),
            fallback_remote: "origin".to_string(),
            branch: "master".to_string(),
            fallback_branch: "main".to_string(),
            tag_prefix: "v".to_string(),
            version_file: PathBuf::from("tr_gui.py"),
            version_pattern: r#"__version__\s*=\s*["']([^"']+)["']"#.to_string(),
            watched_files: vec![
                PathBuf::from("tr_gui.py"),
                PathBuf::from("tr.py"),
                PathBuf::from("pyproject.toml"),
            ],
            build_command: vec![
                "python".to_string(),
                "freeze_setup.py".to_string(),
                "build".to_string(),
            ],
            build_dir: PathBuf::from("freeze_build").join("cx_freeze"),
            artifact: PathBuf::from("DocuReader.exe"),
            backup_dir: PathBuf::from("backup"),
            log_file: PathBuf::from("update.log"),
            build_log: PathBuf::from("build.log"),
            archive_name: "{app}-{version}-portable.zip".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

impl UpdaterConfig {
    // -----------------------------------------------------------------------
    // Load / save
    // -----------------------------------------------------------------------

    /// `<root>/upkeep.yaml`. Pure, no I/O.
    pub fn path_at(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Load `<root>/upkeep.yaml`, or the defaults when the file does not exist.
    pub fn load_at(root: &Path) -> Result<Self, CoreError> {
        Self::load_from(&Self::path_at(root))
    }

    /// Load an explicit config file, or the defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.version_regex()?;
        Ok(config)
    }

    /// Atomically write `<root>/upkeep.yaml`.
    pub fn save_at(&self, root: &Path) -> Result<PathBuf, CoreError> {
        self.save_to(&Self::path_at(root))
    }

    /// Atomically write an explicit config file (`.tmp` sibling, `0600`, rename).
    pub fn save_to(&self, path: &Path) -> Result<PathBuf, CoreError> {
        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }
        Ok(path.to_path_buf())
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    /// Compiled [`Self::version_pattern`]; must contain a capture group.
    pub fn version_regex(&self) -> Result<Regex, CoreError> {
        let regex = Regex::new(&self.version_pattern).map_err(|e| CoreError::VersionPattern {
            pattern: self.version_pattern.clone(),
            reason: e.to_string(),
        })?;
        if regex.captures_len() < 2 {
            return Err(CoreError::VersionPattern {
                pattern: self.version_pattern.clone(),
                reason: "pattern has no capture group".to_string(),
            });
        }
        Ok(regex)
    }

    pub fn build_dir_at(&self, root: &Path) -> PathBuf {
        root.join(&self.build_dir)
    }

    pub fn artifact_at(&self, root: &Path) -> PathBuf {
        self.build_dir_at(root).join(&self.artifact)
    }

    pub fn backup_dir_at(&self, root: &Path) -> PathBuf {
        root.join(&self.backup_dir)
    }

    pub fn log_file_at(&self, root: &Path) -> PathBuf {
        root.join(&self.log_file)
    }

    pub fn build_log_at(&self, root: &Path) -> PathBuf {
        root.join(&self.build_log)
    }

    pub fn version_file_at(&self, root: &Path) -> PathBuf {
        root.join(&self.version_file)
    }

    /// Archive file name for `version`, e.g. `DocuReader-0.2.3-portable.zip`.
    pub fn archive_file_name(&self, version: &Version) -> String {
        self.archive_name
            .replace("{app}", &self.app_name)
            .replace("{version}", &version.to_string())
    }

    pub fn archive_at(&self, root: &Path, version: &Version) -> PathBuf {
        root.join(self.archive_file_name(version))
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_installation_layout() {
        let config = UpdaterConfig::default();
        let root = Path::new("/opt/docureader");
        assert_eq!(
            config.artifact_at(root),
            root.join("freeze_build").join("cx_freeze").join("DocuReader.exe")
        );
        assert_eq!(config.log_file_at(root), root.join("update.log"));
        assert_eq!(config.tag_prefix, "v");
    }

    #[test]
    fn archive_name_substitutes_app_and_version() {
        let config = UpdaterConfig::default();
        assert_eq!(
            config.archive_file_name(&Version::new(0, 2, 3)),
            "DocuReader-0.2.3-portable.zip"
        );
    }

    #[test]
    fn default_version_regex_extracts_triple() {
        let regex = UpdaterConfig::default().version_regex().unwrap();
        let caps = regex.captures("__version__ = '0.2.2'\n").unwrap();
        assert_eq!(&caps[1], "0.2.2");
    }

    #[test]
    fn version_pattern_without_group_is_rejected() {
        let config = UpdaterConfig {
            version_pattern: r"\d+\.\d+\.\d+".to_string(),
            ..UpdaterConfig::default()
        };
        assert!(matches!(
            config.version_regex(),
            Err(CoreError::VersionPattern { .. })
        ));
    }

    #[test]
    fn save_cleans_up_tmp() {
        let root = TempDir::new().unwrap();
        UpdaterConfig::default().save_at(root.path()).unwrap();
        assert!(!root.path().join("upkeep.yaml.tmp").exists());
        assert!(UpdaterConfig::path_at(root.path()).exists());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let root = TempDir::new().unwrap();
        let config = UpdaterConfig::load_at(root.path()).unwrap();
        assert_eq!(config, UpdaterConfig::default());
    }
}
