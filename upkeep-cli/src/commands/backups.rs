//! `upkeep --list-backups`: show snapshots, oldest first.

use anyhow::{Context as _, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use upkeep_build::{Backup, BackupManager};

use crate::Context;

#[derive(Serialize)]
struct BackupJson {
    version: String,
    created_at: String,
    path: String,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "CREATED (UTC)")]
    created: String,
    #[tabled(rename = "PATH")]
    path: String,
}

pub fn run(ctx: &Context, json: bool) -> Result<u8> {
    let manager = BackupManager::new(
        ctx.config.backup_dir_at(&ctx.root),
        ctx.config.build_dir_at(&ctx.root),
    );
    let backups = manager.list().context("failed to list backups")?;

    if json {
        print_json(&backups)?;
    } else {
        print_table(&backups);
    }
    Ok(0)
}

fn print_json(backups: &[Backup]) -> Result<()> {
    let rows: Vec<BackupJson> = backups
        .iter()
        .map(|b| BackupJson {
            version: b.version.to_string(),
            created_at: b.created_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            path: b.path.display().to_string(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn print_table(backups: &[Backup]) {
    if backups.is_empty() {
        println!("No backups found.");
        return;
    }
    let rows: Vec<BackupRow> = backups
        .iter()
        .map(|b| BackupRow {
            version: format!("v{}", b.version),
            created: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            path: b.path.display().to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{}",
        format!("{} backup(s); --rollback restores the last one.", backups.len()).bright_black()
    );
}
