//! Status command - store sizes and per-owner counts

use anyhow::Result;
use colored::*;

use creatorflow_vault::search::VaultStats;
use creatorflow_vault::VaultPaths;

use super::open_vault;

pub fn run(json: bool) -> Result<()> {
    let paths = VaultPaths::new();
    let vault = open_vault(&paths)?;
    let stats = vault.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_status(&paths, &stats);
    }

    Ok(())
}

fn print_status(paths: &VaultPaths, stats: &VaultStats) {
    println!("{}", "Vault Status".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("Database:     {}", paths.database.display());
    println!("Index:        {}", paths.index.display());
    println!("Dimension:    {}", stats.dimension);
    println!("Vectors:      {}", stats.vectors);
    println!("Items:        {}", stats.items);
    println!(
        "Last indexed: {}",
        stats.last_indexed.as_deref().unwrap_or("never")
    );
    println!();

    println!("{}", "Items per Owner".cyan());
    println!("{}", "-".repeat(30));
    if stats.owners.is_empty() {
        println!("   {}", "(empty)".dimmed());
    }
    for owner in &stats.owners {
        let pct = if stats.items > 0 {
            (owner.items as f64 / stats.items as f64) * 100.0
        } else {
            0.0
        };
        println!("   {:<20} {:>6} ({:.0}%)", owner.owner_id, owner.items, pct);
    }

    if stats.vectors as u64 != stats.items {
        println!();
        println!("{}", "⚠️  Vector count and item count differ".yellow());
        println!("   Run `creatorflow verify` for details");
    }

    println!();
    println!("{}", "=".repeat(50));
}
