//! Retrieve command - best performing similar content for an owner

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use creatorflow_vault::{RetrievalFilters, VaultPaths};

use super::{colored_score, open_vault, preview};

#[derive(Args)]
pub struct RetrieveArgs {
    #[arg(long, help = "Owner whose content is searched")]
    pub owner: String,
    #[arg(
        long,
        allow_hyphen_values = true,
        conflicts_with = "vector_file",
        required_unless_present = "vector_file",
        help = "Query vector as comma-separated floats"
    )]
    pub vector: Option<String>,
    #[arg(long, help = "File holding the query vector as a JSON array")]
    pub vector_file: Option<PathBuf>,
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long)]
    pub niche: Option<String>,
    #[arg(long)]
    pub content_type: Option<String>,
    #[arg(long, conflicts_with = "all", help = "Minimum performance score (default from config)")]
    pub min_score: Option<f64>,
    #[arg(long, help = "Disable the minimum performance score")]
    pub all: bool,
    #[arg(long, short, help = "Limit results")]
    pub limit: Option<usize>,
    #[arg(long, help = "JSON output")]
    pub json: bool,
}

fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("'{}' is not a number", s))
        })
        .collect()
}

fn load_query(args: &RetrieveArgs) -> Result<Vec<f32>> {
    let vector = match (&args.vector, &args.vector_file) {
        (Some(raw), _) => parse_vector(raw)?,
        (None, Some(path)) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("{} is not a JSON array of numbers", path.display()))?
        }
        (None, None) => bail!("either --vector or --vector-file is required"),
    };

    if vector.is_empty() {
        bail!("query vector is empty");
    }
    Ok(vector)
}

pub fn run(args: &RetrieveArgs) -> Result<()> {
    let query = load_query(args)?;
    let paths = VaultPaths::new();
    let retrieval = &paths.config.retrieval;

    let filters = RetrievalFilters {
        platform: args.platform.clone(),
        niche: args.niche.clone(),
        content_type: args.content_type.clone(),
        min_performance_score: if args.all {
            None
        } else {
            args.min_score.or(retrieval.default_min_score)
        },
    };
    let limit = args.limit.unwrap_or(retrieval.default_top_k);

    let vault = open_vault(&paths)?;
    let rows = vault.retrieve_rows(&args.owner, &query, &filters, limit)?;

    if args.json {
        let json_results: Vec<_> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "content": r.content,
                    "platform": r.platform,
                    "niche": r.niche,
                    "content_type": r.content_type,
                    "tags": r.tags,
                    "performance_score": r.performance_score,
                    "created_at": r.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_results)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!(
            "{} No matching content for owner {}",
            "→".dimmed(),
            args.owner.cyan()
        );
        return Ok(());
    }

    println!(
        "{} {} result(s) for owner {}",
        "→".dimmed(),
        rows.len(),
        args.owner.cyan()
    );
    println!();

    for (i, row) in rows.iter().enumerate() {
        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            colored_score(row.performance_score),
            preview(&row.content, 72).cyan(),
            format!("#{}", row.id).dimmed()
        );
        println!(
            "   {} | {} | {}",
            row.platform, row.niche, row.content_type
        );
        if !row.tags.is_empty() {
            println!("   {}", serde_json::to_string(&row.tags)?.dimmed());
        }
        println!();
    }

    Ok(())
}
