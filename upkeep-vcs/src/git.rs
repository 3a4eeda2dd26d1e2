//! The [`Vcs`] seam and its `git` command-line implementation.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use upkeep_core::process::{self, CommandOutput};
use upkeep_core::{ReleaseTag, Timeouts};

use crate::error::VcsError;

/// Version-control operations the updater depends on.
///
/// Every method is a single blocking call; implementations bound each one
/// with a timeout and report expiry as an error.
pub trait Vcs {
    /// Names of all configured remotes, in the order the tool reports them.
    fn remotes(&self) -> Result<Vec<String>, VcsError>;

    /// Branch names published on `remote`.
    fn remote_branches(&self, remote: &str) -> Result<Vec<String>, VcsError>;

    /// Force-fetch every tag from `remote`.
    fn fetch_tags(&self, remote: &str) -> Result<(), VcsError>;

    /// Fetch one branch from `remote`, updating its remote-tracking ref.
    fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), VcsError>;

    /// Local tags whose name starts with `prefix`.
    fn tags(&self, prefix: &str) -> Result<Vec<ReleaseTag>, VcsError>;

    /// Nearest tag reachable from the current checkout, if any.
    fn describe_tag(&self) -> Result<Option<ReleaseTag>, VcsError>;

    /// Whether `tag` exists locally.
    fn tag_exists(&self, tag: &ReleaseTag) -> Result<bool, VcsError>;

    /// Hard-reset the working tree to `tag`, discarding local divergence.
    fn reset_hard(&self, tag: &ReleaseTag) -> Result<(), VcsError>;

    /// Fast-forward-only pull of `remote`/`branch`.
    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), VcsError>;

    /// Porcelain status lines; empty when the tree is clean.
    fn status(&self) -> Result<String, VcsError>;

    /// Diff of `path` between two revisions; empty when identical.
    fn diff(&self, from: &str, to: &str, path: &Path) -> Result<String, VcsError>;
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`Vcs`] backed by the `git` binary, run inside `repo`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    timeouts: Timeouts,
    program: String,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>, timeouts: Timeouts) -> Self {
        Self {
            repo: repo.into(),
            timeouts,
            program: "git".to_string(),
        }
    }

    /// Use a different executable in place of `git` (wrappers, absolute paths).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(&self.repo);
        // Never block on a credential prompt; a missing credential is a failure.
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    /// Run and return the raw output, whatever the exit status.
    fn output(&self, args: &[&str], timeout_secs: u64) -> Result<CommandOutput, VcsError> {
        let mut cmd = self.command(args);
        tracing::debug!(command = %process::describe(&cmd), "running");
        Ok(process::run_captured(&mut cmd, Duration::from_secs(timeout_secs))?)
    }

    /// Run and require a zero exit; returns stdout.
    fn run(&self, args: &[&str], timeout_secs: u64) -> Result<String, VcsError> {
        let out = self.output(args, timeout_secs)?;
        if !out.success() {
            return Err(VcsError::Failed {
                command: format!("{} {}", self.program, args.join(" ")),
                code: out.code(),
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout)
    }
}

impl Vcs for GitCli {
    fn remotes(&self) -> Result<Vec<String>, VcsError> {
        let stdout = self.run(&["remote"], self.timeouts.list_remotes)?;
        Ok(non_empty_lines(&stdout))
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<String>, VcsError> {
        let stdout = self.run(
            &["ls-remote", "--heads", remote],
            self.timeouts.list_branches,
        )?;
        Ok(parse_ls_remote_heads(&stdout))
    }

    fn fetch_tags(&self, remote: &str) -> Result<(), VcsError> {
        self.run(&["fetch", remote, "--tags", "--force"], self.timeouts.fetch_tags)?;
        Ok(())
    }

    fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.run(&["fetch", remote, branch], self.timeouts.fetch_branch)?;
        Ok(())
    }

    fn tags(&self, prefix: &str) -> Result<Vec<ReleaseTag>, VcsError> {
        let pattern = format!("{prefix}*");
        let stdout = self.run(&["tag", "-l", &pattern], self.timeouts.describe)?;
        Ok(non_empty_lines(&stdout)
            .into_iter()
            .map(ReleaseTag::from)
            .collect())
    }

    fn describe_tag(&self) -> Result<Option<ReleaseTag>, VcsError> {
        let out = self.output(&["describe", "--tags", "--abbrev=0"], self.timeouts.describe)?;
        if !out.success() {
            return Ok(None);
        }
        let tag = out.stdout.trim();
        Ok((!tag.is_empty()).then(|| ReleaseTag::from(tag)))
    }

    fn tag_exists(&self, tag: &ReleaseTag) -> Result<bool, VcsError> {
        let rev = format!("refs/tags/{tag}");
        let out = self.output(&["rev-parse", "--verify", "--quiet", &rev], self.timeouts.rev_parse)?;
        Ok(out.success())
    }

    fn reset_hard(&self, tag: &ReleaseTag) -> Result<(), VcsError> {
        let rev = format!("refs/tags/{tag}");
        self.run(&["reset", "--hard", &rev], self.timeouts.reset)?;
        Ok(())
    }

    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.run(&["pull", "--ff-only", remote, branch], self.timeouts.pull)?;
        Ok(())
    }

    fn status(&self) -> Result<String, VcsError> {
        self.run(&["status", "--porcelain"], self.timeouts.status)
    }

    fn diff(&self, from: &str, to: &str, path: &Path) -> Result<String, VcsError> {
        let path = path.to_string_lossy();
        self.run(&["diff", from, to, "--", &path], self.timeouts.diff)
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

fn non_empty_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Branch names from `git ls-remote --heads` output (`<sha>\trefs/heads/<name>`).
pub(crate) fn parse_ls_remote_heads(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|reference| reference.strip_prefix("refs/heads/"))
        .map(str::to_owned)
        .collect()
}
