//! Vault configuration module
//!
//! Config is read from `creatorflow.json` in the vault home directory. Every
//! field has a default, so a partial (or missing) file is valid.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "creatorflow.json";
pub const CONFIG_VERSION: u32 = 1;

/// Environment variable overriding the embedding dimension
pub const DIMENSION_ENV: &str = "CREATORFLOW_VECTOR_DIMENSION";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Where the two halves of the vault live, relative to the home directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir", rename = "dataDir")]
    pub data_dir: String,

    #[serde(default = "default_database_file", rename = "databaseFile")]
    pub database_file: String,

    #[serde(default = "default_index_file", rename = "indexFile")]
    pub index_file: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_database_file() -> String {
    "creatorflow.db".to_string()
}

fn default_index_file() -> String {
    "vectors.index".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            index_file: default_index_file(),
        }
    }
}

/// Default embedding model label (all-MiniLM-L6-v2 produces 384 floats)
pub const DEFAULT_EMBED_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Informational only; vectors are computed by the caller
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_model() -> String {
    DEFAULT_EMBED_MODEL.to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            model: default_model(),
        }
    }
}

/// Which vectors the similarity pass scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalScope {
    /// Scan the shared index and over-fetch to survive the owner post-filter
    #[default]
    Global,
    /// Scan only the owner's own vectors
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_overfetch", rename = "overfetchFactor")]
    pub overfetch_factor: usize,

    #[serde(default)]
    pub scope: RetrievalScope,

    #[serde(default = "default_top_k", rename = "defaultTopK")]
    pub default_top_k: usize,

    /// Minimum score applied by the CLI unless overridden. The engine itself
    /// applies no threshold.
    #[serde(default = "default_min_score", rename = "defaultMinScore")]
    pub default_min_score: Option<f64>,
}

fn default_overfetch() -> usize {
    5
}

fn default_top_k() -> usize {
    10
}

fn default_min_score() -> Option<f64> {
    Some(0.5)
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: default_overfetch(),
            scope: RetrievalScope::default(),
            default_top_k: default_top_k(),
            default_min_score: default_min_score(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Config {
    /// Load from the home directory, falling back to defaults on any problem
    pub fn load(home: &Path) -> Self {
        let path = home.join(CONFIG_FILE_NAME);

        let mut config = if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    if config.version > CONFIG_VERSION {
                        warn!(
                            version = config.version,
                            supported = CONFIG_VERSION,
                            "config version is newer than supported"
                        );
                    }
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env();
        config
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(DIMENSION_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(dimension) if dimension > 0 => self.embedding.dimension = dimension,
                _ => warn!(value = %raw, "ignoring invalid {}", DIMENSION_ENV),
            }
        }
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        fs::create_dir_all(home)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(home.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    /// Generate default config file content
    pub fn default_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Config::default())?)
    }

    /// Get resolved storage paths based on the home directory
    pub fn resolve_paths(&self, home: &Path) -> ResolvedPaths {
        let data_dir = home.join(&self.storage.data_dir);
        ResolvedPaths {
            database: data_dir.join(&self.storage.database_file),
            index: data_dir.join(&self.storage.index_file),
            data_dir,
        }
    }
}

/// Resolved absolute storage paths
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub index: PathBuf,
}
