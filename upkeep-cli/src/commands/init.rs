//! `upkeep --init-config`: scaffold a configuration file with the defaults.

use std::path::Path;

use anyhow::{bail, Context, Result};

use upkeep_core::UpdaterConfig;

pub fn run(config_path: &Path) -> Result<u8> {
    if config_path.exists() {
        bail!(
            "{} already exists; edit it or remove it first",
            config_path.display()
        );
    }
    let root = config_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;

    let written = UpdaterConfig::default()
        .save_to(config_path)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    super::ok(&format!("Wrote default configuration to {}", written.display()));
    println!();
    Ok(0)
}
