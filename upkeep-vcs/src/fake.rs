//! Scripted in-memory [`Vcs`] for tests.
//!
//! Fields describe what the "repository" looks like; every trait call is
//! appended to a call log so tests can assert on what was (not) invoked.
//! Tags listed in `remote_tags` only become visible after `fetch_tags`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use upkeep_core::{ProcessError, ReleaseTag};

use crate::error::VcsError;
use crate::git::Vcs;

/// How a scripted call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    /// Killed at its deadline.
    Timeout,
    /// Ran and exited non-zero.
    Exit,
}

impl FakeFailure {
    fn into_error(self, command: &str) -> VcsError {
        match self {
            FakeFailure::Timeout => VcsError::Process(ProcessError::Timeout {
                program: command.to_string(),
                timeout: Duration::from_secs(1),
            }),
            FakeFailure::Exit => VcsError::Failed {
                command: command.to_string(),
                code: Some(128),
                stderr: "scripted failure".to_string(),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeVcs {
    pub remotes: Vec<String>,
    pub remotes_error: Option<FakeFailure>,
    pub branches: Vec<String>,
    pub branches_error: Option<FakeFailure>,
    /// Tags present locally from the start.
    pub local_tags: Vec<String>,
    /// Tags that appear locally once `fetch_tags` succeeds.
    pub remote_tags: Vec<String>,
    pub fetch_tags_error: Option<FakeFailure>,
    pub fetch_branch_error: Option<FakeFailure>,
    pub describe: Option<String>,
    pub reset_error: Option<FakeFailure>,
    pub pull_error: Option<FakeFailure>,
    /// Porcelain status output; `None` makes `status` fail.
    pub status: Option<String>,
    /// Per-path diff output against the remote branch.
    pub diffs: HashMap<PathBuf, String>,
    pub diff_error: Option<FakeFailure>,
    /// Bookkeeping; public only so struct-update syntax works outside this
    /// module. Leave defaulted.
    pub calls: RefCell<Vec<String>>,
    pub fetched: Cell<bool>,
}

impl FakeVcs {
    /// A clean repository with one remote, one branch and the given remote tags.
    pub fn clean(remote: &str, branch: &str, remote_tags: &[&str]) -> Self {
        Self {
            remotes: vec![remote.to_string()],
            branches: vec![branch.to_string()],
            remote_tags: remote_tags.iter().map(|t| t.to_string()).collect(),
            status: Some(String::new()),
            ..Self::default()
        }
    }

    /// Every call made so far, e.g. `"reset_hard v0.2.3"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of calls whose name (first word) is `method`.
    pub fn count(&self, method: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(method))
            .count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    fn visible_tags(&self) -> Vec<&String> {
        let mut tags: Vec<&String> = self.local_tags.iter().collect();
        if self.fetched.get() {
            tags.extend(self.remote_tags.iter());
        }
        tags
    }
}

fn fail(failure: Option<FakeFailure>, command: &str) -> Result<(), VcsError> {
    match failure {
        Some(f) => Err(f.into_error(command)),
        None => Ok(()),
    }
}

impl Vcs for FakeVcs {
    fn remotes(&self) -> Result<Vec<String>, VcsError> {
        self.record("remotes");
        fail(self.remotes_error, "git remote")?;
        Ok(self.remotes.clone())
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<String>, VcsError> {
        self.record(format!("remote_branches {remote}"));
        fail(self.branches_error, "git ls-remote --heads")?;
        Ok(self.branches.clone())
    }

    fn fetch_tags(&self, remote: &str) -> Result<(), VcsError> {
        self.record(format!("fetch_tags {remote}"));
        fail(self.fetch_tags_error, "git fetch --tags")?;
        self.fetched.set(true);
        Ok(())
    }

    fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.record(format!("fetch_branch {remote}/{branch}"));
        fail(self.fetch_branch_error, "git fetch")
    }

    fn tags(&self, prefix: &str) -> Result<Vec<ReleaseTag>, VcsError> {
        self.record(format!("tags {prefix}"));
        Ok(self
            .visible_tags()
            .into_iter()
            .filter(|t| t.starts_with(prefix))
            .map(|t| ReleaseTag::from(t.as_str()))
            .collect())
    }

    fn describe_tag(&self) -> Result<Option<ReleaseTag>, VcsError> {
        self.record("describe_tag");
        Ok(self.describe.as_deref().map(ReleaseTag::from))
    }

    fn tag_exists(&self, tag: &ReleaseTag) -> Result<bool, VcsError> {
        self.record(format!("tag_exists {tag}"));
        Ok(self.visible_tags().iter().any(|t| **t == tag.0))
    }

    fn reset_hard(&self, tag: &ReleaseTag) -> Result<(), VcsError> {
        self.record(format!("reset_hard {tag}"));
        fail(self.reset_error, "git reset --hard")
    }

    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.record(format!("pull_ff_only {remote}/{branch}"));
        fail(self.pull_error, "git pull --ff-only")
    }

    fn status(&self) -> Result<String, VcsError> {
        self.record("status");
        self.status
            .clone()
            .ok_or_else(|| FakeFailure::Exit.into_error("git status --porcelain"))
    }

    fn diff(&self, from: &str, to: &str, path: &Path) -> Result<String, VcsError> {
        self.record(format!("diff {from} {to} {}", path.display()));
        fail(self.diff_error, "git diff")?;
        Ok(self.diffs.get(path).cloned().unwrap_or_default())
    }
}
