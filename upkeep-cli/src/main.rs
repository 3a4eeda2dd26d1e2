//! upkeep, a self-update and release manager for a git-deployed application.
//!
//! # Usage
//!
//! ```text
//! upkeep [--root <dir>] [--config <file>] [--yes] [--force-rebuild] [--allow-dirty]
//! upkeep --check-only [--exit-code]
//! upkeep --rollback
//! upkeep --repackage
//! upkeep --list-backups [--json]
//! upkeep --init-config
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Parser};
use colored::Colorize;

use upkeep_core::UpdaterConfig;
use upkeep_session::logging;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "upkeep",
    version,
    about = "Update the installed application to its latest release",
    long_about = None,
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["check_only", "rollback", "repackage", "list_backups", "init_config"])
        .multiple(false)
))]
pub struct Cli {
    /// Installation root (git checkout). Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file. Defaults to `<root>/upkeep.yaml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only check for updates, don't install.
    #[arg(long)]
    pub check_only: bool,

    /// With --check-only: exit 2 when already on the latest version.
    #[arg(long, requires = "check_only")]
    pub exit_code: bool,

    /// Restore the most recent backup of the build output.
    #[arg(long)]
    pub rollback: bool,

    /// Rebuild, validate and package the installed version.
    #[arg(long)]
    pub repackage: bool,

    /// List available backups.
    #[arg(long)]
    pub list_backups: bool,

    /// With --list-backups: emit machine-readable JSON.
    #[arg(long, requires = "list_backups")]
    pub json: bool,

    /// Write a default configuration file and exit.
    #[arg(long)]
    pub init_config: bool,

    /// Force rebuild even if no source changes are detected.
    #[arg(long)]
    pub force_rebuild: bool,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    pub yes: bool,

    /// Allow updates even when uncommitted local changes exist.
    #[arg(long)]
    pub allow_dirty: bool,
}

/// Resolved installation root and configuration, shared by every command.
pub struct Context {
    pub root: PathBuf,
    pub config: UpdaterConfig,
}

impl Cli {
    fn mode(&self) -> &'static str {
        if self.check_only {
            "check"
        } else if self.rollback {
            "rollback"
        } else if self.repackage {
            "repackage"
        } else if self.list_backups {
            "list-backups"
        } else {
            "update"
        }
    }

    fn root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("could not determine current directory"),
        }
    }

    fn config_path(&self, root: &std::path::Path) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| UpdaterConfig::path_at(root))
    }

    fn run(self) -> Result<u8> {
        let root = self.root()?;
        let config_path = self.config_path(&root);

        if self.init_config {
            return commands::init::run(&config_path);
        }

        let loaded = UpdaterConfig::load_from(&config_path)
            .with_context(|| format!("failed to load configuration {}", config_path.display()));
        // A config that fails to load is still logged, at the default location.
        let log_file = match &loaded {
            Ok(config) => config.log_file_at(&root),
            Err(_) => UpdaterConfig::default().log_file_at(&root),
        };
        logging::init(&log_file).context("failed to initialise logging")?;
        let _banner = logging::session_banner(self.mode());

        let config = match loaded {
            Ok(config) => config,
            Err(err) if self.check_only => return Ok(commands::check::report_failure(&err)),
            Err(err) => return Err(err),
        };

        let ctx = Context { root, config };
        if self.check_only {
            commands::check::run(&ctx, self.exit_code)
        } else if self.rollback {
            commands::rollback::run(&ctx)
        } else if self.repackage {
            commands::update::repackage(&ctx)
        } else if self.list_backups {
            commands::backups::run(&ctx, self.json)
        } else {
            commands::update::run(&ctx, &self)
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let message = commands::describe(&err);
            tracing::error!("Unexpected error: {message}");
            println!("\n{} {message}\n", "[ERROR]".red().bold());
            ExitCode::from(1)
        }
    }
}
