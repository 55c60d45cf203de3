//! Verify command - check that the index and metadata agree

use anyhow::Result;
use colored::*;

use creatorflow_vault::VaultPaths;

use super::open_vault;

pub fn run(json: bool, strict: bool) -> Result<()> {
    let paths = VaultPaths::new();
    let vault = open_vault(&paths)?;
    let report = vault.verify()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "consistent": report.is_consistent(),
                "report": report,
            }))?
        );
    } else {
        println!("{}", "Vault Integrity".bold());
        println!("{}", "=".repeat(50));
        println!();
        println!("Vectors:            {}", report.vectors);
        println!("Metadata rows:      {}", report.rows);
        println!("Distinct positions: {}", report.distinct_positions);
        if let (Some(min), Some(max)) = (report.min_position, report.max_position) {
            println!("Position range:     {}..={}", min, max);
        }
        println!();

        if report.is_consistent() {
            println!("{} Index and metadata are consistent", "✓".green());
        } else {
            for violation in &report.violations {
                println!("{} {}", "✗".red(), violation);
            }
        }
    }

    if strict && !report.is_consistent() {
        std::process::exit(1);
    }

    Ok(())
}
