//! Vault initialization

use anyhow::{Context, Result};
use colored::*;
use std::fs;

use creatorflow_vault::core::config::{Config, CONFIG_FILE_NAME};
use creatorflow_vault::core::paths::{get_home, VaultPaths};

use super::open_vault;

pub fn run(config: bool) -> Result<()> {
    let home = get_home();
    let config_path = home.join(CONFIG_FILE_NAME);

    println!("{}", "CreatorFlow Vault Initialization".bold());
    println!("{}", "=".repeat(50));
    println!();

    if config {
        if config_path.exists() {
            println!(
                "{} Config already exists: {}",
                "→".blue(),
                config_path.display()
            );
        } else {
            Config::default()
                .save(&home)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
            println!("{} Created {}", "✓".green(), config_path.display());
        }
    }

    let paths = VaultPaths::from_root(home);
    let existed = paths.exists();
    fs::create_dir_all(&paths.data_dir)
        .with_context(|| format!("failed to create {}", paths.data_dir.display()))?;

    let vault = open_vault(&paths)?;
    if !paths.index.exists() {
        vault.persist()?;
    }

    let verb = if existed { "Opened" } else { "Created" };
    println!("{} {} database {}", "✓".green(), verb, paths.database.display());
    println!("{} {} index    {}", "✓".green(), verb, paths.index.display());
    println!();
    println!("{}", "Configuration:".cyan());
    println!("  dimension: {}", paths.config.embedding.dimension);
    println!("  model:     {}", paths.config.embedding.model);
    println!(
        "  scope:     {}",
        serde_json::to_string(&paths.config.retrieval.scope)?.trim_matches('"')
    );
    println!("  vectors:   {}", vault.len());
    println!();
    if !config_path.exists() {
        println!(
            "{}",
            "Run `creatorflow init --config` to write an editable creatorflow.json.".dimmed()
        );
    }

    Ok(())
}
