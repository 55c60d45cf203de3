//! CreatorFlow vault
//!
//! Embedded store for creator content: a flat vector index paired with a
//! SQLite metadata store, answering "what has worked best for this creator
//! that looks like this?"

pub mod core;
pub mod search;

pub use crate::core::{
    Config, ContentItem, IndexReport, ItemUpdate, RawMetrics, RetrievalFilters, RetrievalScope,
    RetrievedItem, VaultError, VaultPaths, VaultResult,
};
pub use search::{Vault, VaultOptions};
