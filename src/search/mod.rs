//! Vector storage and retrieval
//!
//! The flat index holds vectors, the metadata store holds everything else,
//! and the engine keeps the two in step.

pub mod distance;
pub mod engine;
pub mod flat_index;
pub mod metadata;
pub mod scoring;

pub use engine::{IntegrityReport, StoragePaths, Vault, VaultOptions, VaultStats};
pub use flat_index::{FlatIndex, Neighbor};
pub use metadata::MetadataStore;
pub use scoring::{performance_score, NEUTRAL_SCORE};
