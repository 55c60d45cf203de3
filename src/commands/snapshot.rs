//! Snapshot command - consistent copy of both stores

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use creatorflow_vault::VaultPaths;

use super::open_vault;

pub fn run(dir: &Path) -> Result<()> {
    let paths = VaultPaths::new();
    let vault = open_vault(&paths)?;

    let target = vault
        .snapshot(dir)
        .with_context(|| format!("failed to snapshot into {}", dir.display()))?;

    println!("{} Snapshot of {} vectors written", "✓".green(), vault.len());
    println!("  {} {}", "→".dimmed(), target.index.display());
    println!("  {} {}", "→".dimmed(), target.database.display());
    println!();
    println!(
        "{}",
        "Restore by copying both files back into the data directory together.".dimmed()
    );

    Ok(())
}
