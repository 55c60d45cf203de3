//! Vault path management
//!
//! Handles home directory detection and storage path resolution.

use std::path::PathBuf;
use tracing::warn;

use super::config::{Config, ResolvedPaths};

/// Environment variable for home directory configuration
pub const HOME_ENV: &str = "CREATORFLOW_HOME";

/// Home directory plus the config loaded from it
pub struct VaultPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub index: PathBuf,
    pub config: Config,
}

impl VaultPaths {
    /// Create VaultPaths from environment variable or current directory.
    /// Loads config from the home directory.
    pub fn new() -> Self {
        Self::from_root(get_home())
    }

    pub fn from_root(root: PathBuf) -> Self {
        let config = Config::load(&root);
        Self::from_root_with_config(root, config)
    }

    pub fn from_root_with_config(root: PathBuf, config: Config) -> Self {
        let ResolvedPaths {
            data_dir,
            database,
            index,
        } = config.resolve_paths(&root);

        Self {
            root,
            data_dir,
            database,
            index,
            config,
        }
    }

    /// True once either half of the vault has been written
    pub fn exists(&self) -> bool {
        self.database.exists() || self.index.exists()
    }
}

impl Default for VaultPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Get home directory from environment variable or current directory.
/// Priority: CREATORFLOW_HOME env var > current directory
pub fn get_home() -> PathBuf {
    if let Ok(path) = std::env::var(HOME_ENV) {
        let home = PathBuf::from(&path);
        if home.exists() {
            return home;
        }
        warn!(
            "{} is set to '{}' but path does not exist. Falling back to current directory.",
            HOME_ENV, path
        );
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
