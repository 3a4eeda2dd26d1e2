//! Change-gated invocation of the external build command.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use upkeep_core::{process, UpdaterConfig};
use upkeep_vcs::{change, RemoteResolver, Vcs};

use crate::error::BuildError;

/// Lines of the build log echoed into the updater log on failure.
const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// No watched source changed and no rebuild was forced.
    Skipped,
    Rebuilt,
}

/// Runs the packaging build in the installation root.
#[derive(Debug, Clone)]
pub struct Builder {
    root: PathBuf,
    command: Vec<String>,
    build_log: PathBuf,
    watched: Vec<PathBuf>,
    timeout: Duration,
}

impl Builder {
    pub fn new(
        root: impl Into<PathBuf>,
        command: Vec<String>,
        build_log: impl Into<PathBuf>,
        watched: Vec<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            root: root.into(),
            command,
            build_log: build_log.into(),
            watched,
            timeout,
        }
    }

    pub fn from_config(config: &UpdaterConfig, root: &Path) -> Self {
        Self::new(
            root,
            config.build_command.clone(),
            config.build_log_at(root),
            config.watched_files.clone(),
            Duration::from_secs(config.timeouts.build),
        )
    }

    pub fn build_log(&self) -> &Path {
        &self.build_log
    }

    /// Rebuild when forced or when a watched source differs from the remote
    /// branch.
    pub fn rebuild(
        &self,
        force: bool,
        vcs: &dyn Vcs,
        resolver: &mut RemoteResolver,
    ) -> Result<RebuildOutcome, BuildError> {
        if !force && !change::changed(vcs, resolver, &self.watched) {
            tracing::info!("no source changes detected; skipping rebuild");
            return Ok(RebuildOutcome::Skipped);
        }
        self.run()?;
        Ok(RebuildOutcome::Rebuilt)
    }

    /// Run the build command unconditionally.
    pub fn run(&self) -> Result<(), BuildError> {
        let (program, args) = self.command.split_first().ok_or(BuildError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.root);

        tracing::info!(
            log = %self.build_log.display(),
            "building application: {}",
            self.command.join(" ")
        );
        let status = process::run_logged(&mut cmd, &self.build_log, self.timeout).map_err(|err| {
            if err.is_timeout() {
                tracing::error!("build timed out after {}s", self.timeout.as_secs());
            } else {
                tracing::error!(error = %err, "build could not be started");
            }
            BuildError::Process(err)
        })?;

        if !status.success() {
            tracing::error!(code = ?status.code(), "build failed");
            self.log_tail();
            return Err(BuildError::BuildFailed {
                code: status.code(),
                log: self.build_log.clone(),
            });
        }
        tracing::info!("build completed successfully");
        Ok(())
    }

    fn log_tail(&self) {
        let Ok(contents) = std::fs::read_to_string(&self.build_log) else {
            return;
        };
        let lines: Vec<&str> = contents.lines().collect();
        let start = lines.len().saturating_sub(LOG_TAIL_LINES);
        for line in &lines[start..] {
            tracing::error!("build: {line}");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use upkeep_vcs::fake::FakeVcs;

    fn sh(root: &Path, script: &str, timeout: Duration) -> Builder {
        Builder::new(
            root,
            vec!["sh".into(), "-c".into(), script.into()],
            root.join("build.log"),
            vec![PathBuf::from("tr_gui.py")],
            timeout,
        )
    }

    fn resolver() -> RemoteResolver {
        RemoteResolver::new("task_releaser", "origin", "master", "main")
    }

    #[test]
    fn unchanged_sources_skip_the_build() {
        let tmp = TempDir::new().unwrap();
        let builder = sh(tmp.path(), "touch built", Duration::from_secs(10));
        let vcs = FakeVcs::clean("origin", "main", &[]);

        let outcome = builder.rebuild(false, &vcs, &mut resolver()).unwrap();
        assert_eq!(outcome, RebuildOutcome::Skipped);
        assert!(!tmp.path().join("built").exists());
    }

    #[test]
    fn forced_rebuild_ignores_change_detection() {
        let tmp = TempDir::new().unwrap();
        let builder = sh(tmp.path(), "touch built", Duration::from_secs(10));
        let vcs = FakeVcs::clean("origin", "main", &[]);

        let outcome = builder.rebuild(true, &vcs, &mut resolver()).unwrap();
        assert_eq!(outcome, RebuildOutcome::Rebuilt);
        assert!(tmp.path().join("built").exists());
        assert_eq!(vcs.count("diff"), 0);
    }

    #[test]
    fn changed_sources_trigger_the_build() {
        let tmp = TempDir::new().unwrap();
        let builder = sh(tmp.path(), "echo compiling; touch built", Duration::from_secs(10));
        let mut vcs = FakeVcs::clean("origin", "main", &[]);
        vcs.diffs.insert(PathBuf::from("tr_gui.py"), "+changed\n".into());

        assert_eq!(
            builder.rebuild(false, &vcs, &mut resolver()).unwrap(),
            RebuildOutcome::Rebuilt
        );
        let log = std::fs::read_to_string(builder.build_log()).unwrap();
        assert!(log.contains("compiling"));
    }

    #[test]
    fn non_zero_exit_is_a_build_failure() {
        let tmp = TempDir::new().unwrap();
        let builder = sh(tmp.path(), "echo boom >&2; exit 3", Duration::from_secs(10));
        let err = builder.run().unwrap_err();
        assert!(matches!(err, BuildError::BuildFailed { code: Some(3), .. }));
        assert!(std::fs::read_to_string(builder.build_log()).unwrap().contains("boom"));
    }

    #[test]
    fn overrunning_build_is_killed() {
        let tmp = TempDir::new().unwrap();
        let builder = sh(tmp.path(), "sleep 5", Duration::from_millis(200));
        let err = builder.run().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn empty_command_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let builder = Builder::new(
            tmp.path(),
            Vec::new(),
            tmp.path().join("build.log"),
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(builder.run(), Err(BuildError::EmptyCommand)));
    }
}
