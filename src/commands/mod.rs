pub mod index;
pub mod init;
pub mod retrieve;
pub mod snapshot;
pub mod status;
pub mod update;
pub mod verify;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use unicode_width::UnicodeWidthChar;

use creatorflow_vault::{Vault, VaultPaths};

/// Open the vault described by the home directory config
pub(crate) fn open_vault(paths: &VaultPaths) -> Result<Vault> {
    Vault::from_paths(paths)
        .with_context(|| format!("failed to open vault in {}", paths.data_dir.display()))
}

/// Single-line preview at most `max_width` terminal columns wide
pub(crate) fn preview(text: &str, max_width: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let total: usize = flat.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max_width {
        return flat;
    }

    let budget = max_width.saturating_sub(3);
    let mut used = 0;
    let mut out = String::new();
    for c in flat.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str("...");
    out
}

pub(crate) fn colored_score(score: f64) -> ColoredString {
    let text = format!("{:.2}", score);
    if score >= 0.8 {
        text.green()
    } else if score >= 0.5 {
        text.yellow()
    } else {
        text.dimmed()
    }
}
