//! Index command - load batch files into the vault

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use creatorflow_vault::core::batch::{collect_batch_files, BatchFile};
use creatorflow_vault::core::item::IndexReport;
use creatorflow_vault::VaultPaths;

use super::open_vault;

#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    owner_id: String,
    #[serde(flatten)]
    report: IndexReport,
}

pub fn run(path: &Path, owner: Option<&str>, json: bool) -> Result<()> {
    let files = collect_batch_files(path);
    if files.is_empty() {
        bail!("no .json/.yaml batch files found at {}", path.display());
    }

    let paths = VaultPaths::new();
    let vault = open_vault(&paths)?;

    if !json {
        println!("{} Indexing {} batch file(s)...", "→".dimmed(), files.len());
    }

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let batch = BatchFile::load(&file)?;
        let owner_id = match owner.or(batch.owner_id.as_deref()) {
            Some(id) => id.to_string(),
            None => bail!(
                "{} has no owner_id; pass --owner to index it",
                file.display()
            ),
        };

        let report = match vault.index_items(&owner_id, &batch.items) {
            Ok(report) => report,
            Err(e) => {
                if let (Some(partial), false) = (e.partial_report(), json) {
                    println!(
                        "{} {}: {} item(s) committed before the batch stopped",
                        "✗".red(),
                        file.display(),
                        partial.indexed_count
                    );
                    for failure in &partial.failures {
                        println!("  {} item {}: {}", "✗".red(), failure.index, failure.reason);
                    }
                }
                return Err(e).with_context(|| format!("indexing {} stopped", file.display()));
            }
        };

        reports.push(FileReport {
            path: file,
            owner_id,
            report,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!();
    let mut total = 0;
    for entry in &reports {
        total += entry.report.indexed_count;
        println!(
            "{} {} ({}): {} indexed",
            "✓".green(),
            entry.path.display(),
            entry.owner_id.cyan(),
            entry.report.indexed_count
        );
        for failure in &entry.report.failures {
            println!(
                "  {} item {}: {}",
                "✗".red(),
                failure.index,
                failure.reason
            );
        }
    }
    println!();
    println!(
        "{} {} item(s) indexed, {} vectors in store",
        "→".dimmed(),
        total.to_string().cyan(),
        vault.len()
    );

    Ok(())
}
