//! Update command - amend metadata of an indexed item

use anyhow::{bail, Context, Result};
use colored::Colorize;

use creatorflow_vault::core::item::Tags;
use creatorflow_vault::{ItemUpdate, VaultPaths};

use super::{colored_score, open_vault, preview};

pub fn run(
    id: i64,
    platform: Option<String>,
    niche: Option<String>,
    content_type: Option<String>,
    tags: Option<String>,
    score: Option<f64>,
    json: bool,
) -> Result<()> {
    let tags = match tags {
        Some(raw) => Some(
            serde_json::from_str::<Tags>(&raw).context("--tags must be a JSON object")?,
        ),
        None => None,
    };

    let update = ItemUpdate {
        platform,
        niche,
        content_type,
        tags,
        performance_score: score,
    };
    if update.is_empty() {
        bail!("nothing to update; pass at least one of --platform, --niche, --content-type, --tags, --score");
    }

    let paths = VaultPaths::new();
    let vault = open_vault(&paths)?;
    vault.update_item(id, &update)?;

    let Some(item) = vault.get_item(id)? else {
        bail!("item {} disappeared after update", id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("{} Updated item {}", "✓".green(), format!("#{}", id).cyan());
    println!("  content:  {}", preview(&item.content, 60));
    println!("  owner:    {}", item.owner_id);
    println!(
        "  metadata: {} | {} | {}",
        item.platform, item.niche, item.content_type
    );
    println!("  score:    {}", colored_score(item.performance_score));

    Ok(())
}
