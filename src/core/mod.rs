pub mod batch;
pub mod config;
pub mod error;
pub mod item;
pub mod paths;

pub use config::{Config, RetrievalScope};
pub use error::{ErrorKind, VaultError, VaultResult};
pub use item::{
    ContentItem, EmbeddedItem, IndexFailure, IndexReport, ItemUpdate, RawMetrics,
    RetrievalFilters, RetrievedItem, Tags,
};
pub use paths::VaultPaths;
