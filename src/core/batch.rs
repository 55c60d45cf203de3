//! Batch files for the indexer
//!
//! A batch file is JSON or YAML shaped as `{ owner_id?, items: [...] }`.
//! Directories are walked recursively; hidden entries are skipped.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::error::{VaultError, VaultResult};
use super::item::ContentItem;

#[derive(Debug, Clone, Deserialize)]
pub struct BatchFile {
    #[serde(default)]
    pub owner_id: Option<String>,
    pub items: Vec<ContentItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchFormat {
    Json,
    Yaml,
}

fn batch_format(path: &Path) -> Option<BatchFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(BatchFormat::Json),
        Some("yaml") | Some("yml") => Some(BatchFormat::Yaml),
        _ => None,
    }
}

impl BatchFile {
    pub fn load(path: &Path) -> VaultResult<Self> {
        let format = batch_format(path).ok_or_else(|| {
            VaultError::InvalidInput(format!(
                "{} is not a .json, .yaml or .yml batch file",
                path.display()
            ))
        })?;
        let content = fs::read_to_string(path)?;
        Self::parse(&content, format).map_err(|reason| {
            VaultError::InvalidInput(format!("{}: {}", path.display(), reason))
        })
    }

    fn parse(content: &str, format: BatchFormat) -> Result<Self, String> {
        match format {
            BatchFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            BatchFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_str().map(|s| s.starts_with('.')).unwrap_or(false))
}

/// Batch files under `root`, sorted by path. A file path is returned as is.
pub fn collect_batch_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && !is_hidden(p, root) && batch_format(p).is_some())
        .collect();

    files.sort();
    files
}
