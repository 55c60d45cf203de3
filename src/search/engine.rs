//! Vault engine - pairs the flat vector index with the metadata store
//!
//! Indexing appends vectors and inserts metadata rows under one writer lock,
//! so the two stores always hold the same number of items. Retrieval builds a
//! candidate pool by vector similarity, then filters and ranks it by
//! performance score in the metadata store.
//!
//! Commit order is vectors first: new vectors are written through to the
//! index file before their metadata rows are inserted. A crash in between
//! leaves the index longer than the metadata, which [`Vault::open`] repairs
//! by truncating the index back to the metadata row count.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::flat_index::FlatIndex;
use super::metadata::{format_timestamp, MetadataStore};
use super::scoring::performance_score;
use crate::core::config::{Config, RetrievalScope};
use crate::core::error::{VaultError, VaultResult};
use crate::core::item::{
    ContentItem, EmbeddedItem, IndexFailure, IndexReport, ItemUpdate, NewItem,
    RetrievalFilters, RetrievedItem,
};
use crate::core::paths::VaultPaths;

const META_DIMENSION: &str = "dimension";
const META_LAST_INDEXED: &str = "last_indexed";

/// File names used inside a snapshot directory
pub const SNAPSHOT_DATABASE_FILE: &str = "creatorflow.db";
pub const SNAPSHOT_INDEX_FILE: &str = "vectors.index";

/// Engine options
#[derive(Debug, Clone)]
pub struct VaultOptions {
    pub dimension: usize,
    /// Candidate pool width is `top_k * overfetch_factor`
    pub overfetch_factor: usize,
    pub scope: RetrievalScope,
}

impl VaultOptions {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            overfetch_factor: 5,
            scope: RetrievalScope::Global,
        }
    }

    pub fn with_scope(mut self, scope: RetrievalScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            dimension: config.embedding.dimension,
            overfetch_factor: config.retrieval.overfetch_factor,
            scope: config.retrieval.scope,
        }
    }

    fn validate(&self) -> VaultResult<()> {
        if self.dimension == 0 {
            return Err(VaultError::InvalidInput(
                "vector dimension must be positive".to_string(),
            ));
        }
        if self.overfetch_factor == 0 {
            return Err(VaultError::InvalidInput(
                "overfetch factor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Backing files of a vault. Both must be backed up and restored together.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub database: PathBuf,
    pub index: PathBuf,
}

impl StoragePaths {
    /// Layout used by snapshots
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            database: dir.join(SNAPSHOT_DATABASE_FILE),
            index: dir.join(SNAPSHOT_INDEX_FILE),
        }
    }
}

impl From<&VaultPaths> for StoragePaths {
    fn from(paths: &VaultPaths) -> Self {
        Self {
            database: paths.database.clone(),
            index: paths.index.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerCount {
    pub owner_id: String,
    pub items: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultStats {
    pub dimension: usize,
    pub scope: RetrievalScope,
    pub vectors: usize,
    pub items: u64,
    pub owners: Vec<OwnerCount>,
    pub last_indexed: Option<String>,
}

/// Result of checking the index/metadata invariants
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub vectors: usize,
    pub rows: u64,
    pub distinct_positions: u64,
    pub min_position: Option<u64>,
    pub max_position: Option<u64>,
    pub violations: Vec<String>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

struct VaultState {
    index: FlatIndex,
    /// Number of vectors currently in the index file
    durable_len: usize,
    meta: Mutex<MetadataStore>,
}

/// Embedded vector store: flat index + SQLite metadata behind one lock
pub struct Vault {
    options: VaultOptions,
    storage: Option<StoragePaths>,
    state: RwLock<VaultState>,
}

impl Vault {
    /// Open (or create) a file-backed vault and repair a torn commit
    pub fn open(storage: StoragePaths, options: VaultOptions) -> VaultResult<Self> {
        options.validate()?;

        let meta = MetadataStore::open(&storage.database)?;
        check_dimension(&meta, options.dimension)?;

        let index = if storage.index.exists() {
            FlatIndex::load(&storage.index, options.dimension)?
        } else {
            FlatIndex::new(options.dimension)
        };

        let mut state = VaultState {
            durable_len: index.len(),
            index,
            meta: Mutex::new(meta),
        };
        reconcile(&mut state, Some(storage.index.as_path()))?;

        info!(
            database = %storage.database.display(),
            index = %storage.index.display(),
            vectors = state.index.len(),
            "opened vault"
        );

        Ok(Self {
            options,
            storage: Some(storage),
            state: RwLock::new(state),
        })
    }

    /// Open the vault described by resolved paths and their config
    pub fn from_paths(paths: &VaultPaths) -> VaultResult<Self> {
        Self::open(StoragePaths::from(paths), VaultOptions::from_config(&paths.config))
    }

    /// Create with in-memory storage (for testing)
    pub fn open_in_memory(options: VaultOptions) -> VaultResult<Self> {
        options.validate()?;
        let meta = MetadataStore::open_in_memory()?;
        check_dimension(&meta, options.dimension)?;

        Ok(Self {
            state: RwLock::new(VaultState {
                index: FlatIndex::new(options.dimension),
                durable_len: 0,
                meta: Mutex::new(meta),
            }),
            options,
            storage: None,
        })
    }

    pub fn options(&self) -> &VaultOptions {
        &self.options
    }

    pub fn storage(&self) -> Option<&StoragePaths> {
        self.storage.as_ref()
    }

    /// Index a batch of items for one owner.
    ///
    /// Invalid items are reported in `failures` and commit nothing. A metadata
    /// insert failing after its vector was appended aborts the batch with
    /// [`VaultError::BatchAborted`] wrapping a consistency violation. Earlier
    /// items stay committed and are counted in the carried report.
    pub fn index_items(&self, owner_id: &str, items: &[ContentItem]) -> VaultResult<IndexReport> {
        if owner_id.trim().is_empty() {
            return Err(VaultError::InvalidInput("owner_id must not be blank".to_string()));
        }

        let mut report = IndexReport::default();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let mut staged = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match validate_item(&state.index, item) {
                Ok(score) => staged.push((i, item, score)),
                Err(e) => {
                    debug!(owner_id, item = i, error = %e, "rejected batch item");
                    report.failures.push(IndexFailure::new(i, &e));
                }
            }
        }

        if staged.is_empty() {
            return Ok(report);
        }

        // vectors first, written through before any metadata row exists
        let base = state.index.len();
        for (_, item, _) in &staged {
            if let Err(e) = state.index.append(&item.vector) {
                state.index.truncate(base);
                return Err(e);
            }
        }
        if let Some(ref storage) = self.storage {
            match state.index.sync_to(&storage.index, state.durable_len) {
                Ok(len) => state.durable_len = len,
                Err(e) => {
                    state.index.truncate(base);
                    state.durable_len = state.durable_len.min(base);
                    return Err(e);
                }
            }
        }

        let meta = state.meta.get_mut();
        for (offset, (i, item, score)) in staged.iter().enumerate() {
            let position = base + offset;
            let row = NewItem {
                position: position as u64,
                owner_id,
                platform: &item.platform,
                niche: &item.niche,
                content_type: &item.content_type,
                content: &item.content,
                tags: &item.tags,
                performance_score: *score,
                created_at: Utc::now(),
            };

            if let Err(e) = meta.insert(&row) {
                state.index.truncate(position);
                state.durable_len = state.durable_len.min(position);
                error!(
                    owner_id,
                    position,
                    committed = report.indexed_count,
                    error = %e,
                    "metadata insert failed after vector append; index tail rolled back"
                );
                let violation = VaultError::ConsistencyViolation(format!(
                    "metadata insert for batch item {} failed after its vector was appended: {}",
                    i, e
                ));
                return Err(VaultError::BatchAborted {
                    report,
                    source: Box::new(violation),
                });
            }
            report.indexed_count += 1;
        }

        if let Err(e) = meta.set_meta(META_LAST_INDEXED, &format_timestamp(&Utc::now())) {
            warn!(error = %e, "failed to record last indexed time");
        }

        info!(
            owner_id,
            indexed = report.indexed_count,
            failed = report.failures.len(),
            vectors = state.index.len(),
            "indexed batch"
        );

        Ok(report)
    }

    /// Most relevant, best performing items of one owner
    pub fn retrieve(
        &self,
        owner_id: &str,
        query: &[f32],
        filters: &RetrievalFilters,
        top_k: usize,
    ) -> VaultResult<Vec<RetrievedItem>> {
        Ok(self
            .retrieve_rows(owner_id, query, filters, top_k)?
            .into_iter()
            .map(RetrievedItem::from)
            .collect())
    }

    /// Same as [`retrieve`](Self::retrieve) but keeps ids and positions
    pub fn retrieve_rows(
        &self,
        owner_id: &str,
        query: &[f32],
        filters: &RetrievalFilters,
        top_k: usize,
    ) -> VaultResult<Vec<EmbeddedItem>> {
        filters.validate()?;

        let state = self.state.read();
        state.index.validate(query)?;

        if top_k == 0 || state.index.is_empty() {
            return Ok(Vec::new());
        }

        let width = top_k.saturating_mul(self.options.overfetch_factor);
        let candidates = match self.options.scope {
            RetrievalScope::Global => state.index.search(query, width.min(state.index.len()))?,
            RetrievalScope::Owner => {
                let owned = state.meta.lock().positions_for_owner(owner_id)?;
                if owned.is_empty() {
                    return Ok(Vec::new());
                }
                state
                    .index
                    .search_subset(query, &owned, width.min(owned.len()))?
            }
        };

        let positions: Vec<u64> = candidates.iter().map(|n| n.position).collect();
        let rows = state.meta.lock().query(owner_id, &positions, filters, top_k)?;

        debug!(
            owner_id,
            candidates = positions.len(),
            returned = rows.len(),
            "retrieved items"
        );

        Ok(rows)
    }

    /// Amend the mutable metadata of an item
    pub fn update_item(&self, id: i64, update: &ItemUpdate) -> VaultResult<()> {
        let mut state = self.state.write();
        state.meta.get_mut().update(id, update)
    }

    pub fn get_item(&self, id: i64) -> VaultResult<Option<EmbeddedItem>> {
        self.state.read().meta.lock().get(id)
    }

    /// Number of items indexed for an owner
    pub fn count(&self, owner_id: &str) -> VaultResult<u64> {
        self.state.read().meta.lock().count(owner_id)
    }

    pub fn count_all(&self) -> VaultResult<u64> {
        self.state.read().meta.lock().count_all()
    }

    /// Vector index size
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> VaultResult<VaultStats> {
        let state = self.state.read();
        let meta = state.meta.lock();

        Ok(VaultStats {
            dimension: self.options.dimension,
            scope: self.options.scope,
            vectors: state.index.len(),
            items: meta.count_all()?,
            owners: meta
                .owners()?
                .into_iter()
                .map(|(owner_id, items)| OwnerCount { owner_id, items })
                .collect(),
            last_indexed: meta.get_meta(META_LAST_INDEXED)?,
        })
    }

    /// Check that vector count and metadata rows agree and positions are dense
    pub fn verify(&self) -> VaultResult<IntegrityReport> {
        let state = self.state.read();
        let summary = state.meta.lock().position_summary()?;
        let vectors = state.index.len();

        let mut violations = Vec::new();
        if summary.rows != vectors as u64 {
            violations.push(format!(
                "index holds {} vectors but metadata has {} rows",
                vectors, summary.rows
            ));
        }
        if summary.distinct != summary.rows {
            violations.push(format!(
                "{} rows share a position with another row",
                summary.rows - summary.distinct
            ));
        }
        if let Some(max) = summary.max {
            if max >= vectors as u64 {
                violations.push(format!(
                    "position {} is beyond the index size {}",
                    max, vectors
                ));
            }
        }
        if summary.rows > 0 && summary.min != Some(0) {
            violations.push("positions do not start at 0".to_string());
        }

        Ok(IntegrityReport {
            vectors,
            rows: summary.rows,
            distinct_positions: summary.distinct,
            min_position: summary.min,
            max_position: summary.max,
            violations,
        })
    }

    /// Rewrite the index file from memory. Metadata rows are already durable.
    pub fn persist(&self) -> VaultResult<()> {
        let storage = self.require_storage()?;
        let mut state = self.state.write();
        state.index.persist(&storage.index)?;
        state.durable_len = state.index.len();
        info!(path = %storage.index.display(), vectors = state.durable_len, "persisted vault");
        Ok(())
    }

    /// Copy both stores into `dir`. Writers wait; readers continue.
    pub fn snapshot(&self, dir: &Path) -> VaultResult<StoragePaths> {
        std::fs::create_dir_all(dir)?;
        let target = StoragePaths::in_dir(dir);

        if let Some(ref live) = self.storage {
            let live_files = [resolve_file(&live.index), resolve_file(&live.database)];
            for file in [&target.index, &target.database] {
                if live_files.contains(&resolve_file(file)) {
                    return Err(VaultError::InvalidInput(format!(
                        "snapshot target {} is a live vault file",
                        file.display()
                    )));
                }
            }
        }

        let state = self.state.read();
        state.index.persist(&target.index)?;
        state.meta.lock().backup_to(&target.database)?;

        info!(dir = %dir.display(), vectors = state.index.len(), "wrote snapshot");
        Ok(target)
    }

    /// Replace the in-memory index with the file contents
    pub fn reload(&self) -> VaultResult<()> {
        let storage = self.require_storage()?;

        // writers stay out until the file has been read and reconciled
        let mut guard = self.state.write();
        let state = &mut *guard;
        let index = FlatIndex::load(&storage.index, self.options.dimension)?;
        let loaded = index.len();
        let previous = std::mem::replace(&mut state.index, index);
        let previous_durable = std::mem::replace(&mut state.durable_len, loaded);
        if let Err(e) = reconcile(state, Some(storage.index.as_path())) {
            state.index = previous;
            state.durable_len = previous_durable;
            return Err(e);
        }
        info!(vectors = state.index.len(), "reloaded vector index");
        Ok(())
    }

    fn require_storage(&self) -> VaultResult<&StoragePaths> {
        self.storage.as_ref().ok_or_else(|| {
            VaultError::InvalidInput("in-memory vault has no backing files".to_string())
        })
    }
}

/// Canonical form of a file path whose file may not exist yet
fn resolve_file(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match (parent.map(Path::canonicalize), path.file_name()) {
        (Some(Ok(dir)), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Validate one batch item and compute its performance score
fn validate_item(index: &FlatIndex, item: &ContentItem) -> VaultResult<f64> {
    if item.content.trim().is_empty() {
        return Err(VaultError::InvalidInput("content must not be empty".to_string()));
    }
    for (name, value) in [
        ("platform", &item.platform),
        ("niche", &item.niche),
        ("content_type", &item.content_type),
    ] {
        if value.trim().is_empty() {
            return Err(VaultError::InvalidInput(format!("{} must not be blank", name)));
        }
    }
    index.validate(&item.vector)?;
    if let Some(ref metrics) = item.metrics {
        metrics.validate()?;
    }
    Ok(performance_score(item.metrics.as_ref()))
}

/// Record the dimension on first open, reject a different one afterwards
fn check_dimension(meta: &MetadataStore, dimension: usize) -> VaultResult<()> {
    match meta.get_meta(META_DIMENSION)? {
        Some(stored) => {
            let stored: usize = stored.parse().map_err(|_| {
                VaultError::StorageUnavailable(format!("corrupt stored dimension '{}'", stored))
            })?;
            if stored != dimension {
                return Err(VaultError::InvalidInput(format!(
                    "vault was built for dimension {}, configured dimension is {}",
                    stored, dimension
                )));
            }
            Ok(())
        }
        None => meta.set_meta(META_DIMENSION, &dimension.to_string()),
    }
}

/// Bring the index back in line with the metadata after a torn commit
fn reconcile(state: &mut VaultState, index_path: Option<&Path>) -> VaultResult<()> {
    let summary = state.meta.get_mut().position_summary()?;
    let vectors = state.index.len() as u64;

    if summary.rows > vectors {
        return Err(VaultError::ConsistencyViolation(format!(
            "metadata has {} rows but the index holds only {} vectors",
            summary.rows, vectors
        )));
    }
    let dense = summary.distinct == summary.rows
        && summary.max.map_or(true, |max| max + 1 == summary.rows);
    if !dense {
        return Err(VaultError::ConsistencyViolation(format!(
            "metadata positions are not dense: {} rows, {} distinct, max {:?}",
            summary.rows, summary.distinct, summary.max
        )));
    }

    if vectors > summary.rows {
        warn!(
            vectors,
            rows = summary.rows,
            "index holds uncommitted vectors; truncating to metadata row count"
        );
        let keep = summary.rows as usize;
        state.index.truncate(keep);
        state.durable_len = state.durable_len.min(keep);
        if let Some(path) = index_path {
            state.durable_len = state.index.sync_to(path, state.durable_len)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::item::RawMetrics;
    use std::sync::Arc;

    /// views such that the score comes out as `score`
    fn scored(content: &str, vector: Vec<f32>, score: f64) -> ContentItem {
        ContentItem::new(content, vector).with_metrics(RawMetrics::views(score * 250_000.0))
    }

    fn scenario_vault(scope: RetrievalScope) -> Vault {
        let vault = Vault::open_in_memory(VaultOptions::new(2).with_scope(scope)).unwrap();
        let report = vault
            .index_items(
                "u1",
                &[
                    scored("exact", vec![1.0, 0.0], 0.9),
                    scored("orthogonal", vec![0.0, 1.0], 0.2),
                    scored("close", vec![0.9, 0.1], 0.3),
                ],
            )
            .unwrap();
        assert_eq!(report.indexed_count, 3);
        vault
    }

    fn contents(items: &[RetrievedItem]) -> Vec<&str> {
        items.iter().map(|i| i.content.as_str()).collect()
    }

    fn assert_invariant(vault: &Vault) {
        let report = vault.verify().unwrap();
        assert!(report.is_consistent(), "{:?}", report.violations);
        assert_eq!(vault.len() as u64, vault.count_all().unwrap());
    }

    #[test]
    fn test_scenario_a_reranks_by_performance() {
        for scope in [RetrievalScope::Global, RetrievalScope::Owner] {
            let vault = scenario_vault(scope);
            let results = vault
                .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 2)
                .unwrap();

            assert_eq!(contents(&results), vec!["exact", "close"]);
            assert!((results[0].performance_score - 0.9).abs() < 1e-9);
            assert!((results[1].performance_score - 0.3).abs() < 1e-9);
        }
    }

    #[test]
    fn test_performance_beats_similarity() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        vault
            .index_items(
                "u1",
                &[
                    scored("nearest but weak", vec![1.0, 0.0], 0.1),
                    scored("farther but strong", vec![0.5, 0.5], 0.8),
                ],
            )
            .unwrap();

        let results = vault
            .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 2)
            .unwrap();
        assert_eq!(contents(&results), vec!["farther but strong", "nearest but weak"]);
    }

    #[test]
    fn test_scenario_b_unknown_owner() {
        let vault = scenario_vault(RetrievalScope::Global);
        let results = vault
            .retrieve("nobody", &[1.0, 0.0], &RetrievalFilters::default(), 5)
            .unwrap();
        assert!(results.is_empty());

        let empty = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        assert!(empty
            .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 5)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_scenario_c_wrong_dimension_rejected() {
        let vault = scenario_vault(RetrievalScope::Global);
        let report = vault
            .index_items("u1", &[ContentItem::new("too wide", vec![1.0, 0.0, 0.0])])
            .unwrap();

        assert_eq!(report.indexed_count, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].kind, ErrorKind::InvalidInput);
        assert_eq!(vault.len(), 3);
        assert_eq!(vault.count_all().unwrap(), 3);
    }

    #[test]
    fn test_mixed_batch_commits_valid_items() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        let bad_metrics = ContentItem::new("bad", vec![0.0, 1.0]).with_metrics(RawMetrics {
            likes: Some(-3.0),
            ..RawMetrics::default()
        });
        let report = vault
            .index_items(
                "u1",
                &[
                    ContentItem::new("ok", vec![1.0, 0.0]),
                    bad_metrics,
                    ContentItem::new("   ", vec![1.0, 1.0]),
                    ContentItem::new("nan", vec![f32::NAN, 1.0]),
                    ContentItem::new("ok too", vec![0.5, 0.5]),
                ],
            )
            .unwrap();

        assert_eq!(report.indexed_count, 2);
        let failed: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 2, 3]);
        assert_invariant(&vault);
    }

    #[test]
    fn test_unscored_items_are_neutral() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        vault
            .index_items("u1", &[ContentItem::new("no data", vec![1.0, 0.0])])
            .unwrap();
        let results = vault
            .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 1)
            .unwrap();
        assert_eq!(results[0].performance_score, 0.5);
    }

    #[test]
    fn test_blank_owner_rejected() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        let result = vault.index_items(" ", &[ContentItem::new("x", vec![1.0, 0.0])]);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
        assert!(vault.is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let vault = scenario_vault(RetrievalScope::Global);
        let result = vault.retrieve("u1", &[1.0], &RetrievalFilters::default(), 2);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));

        let empty = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        let result = empty.retrieve("u1", &[1.0, 0.0, 0.0], &RetrievalFilters::default(), 2);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_filters() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        vault
            .index_items(
                "u1",
                &[
                    scored("tiktok hook", vec![1.0, 0.0], 0.7)
                        .with_platform("tiktok")
                        .with_content_type("hook"),
                    scored("short script", vec![1.0, 0.1], 0.9)
                        .with_platform("youtube_short")
                        .with_content_type("script"),
                    scored("weak hook", vec![0.9, 0.0], 0.2)
                        .with_platform("tiktok")
                        .with_content_type("hook"),
                ],
            )
            .unwrap();

        let filters = RetrievalFilters {
            platform: Some("tiktok".to_string()),
            ..RetrievalFilters::default()
        };
        let results = vault.retrieve("u1", &[1.0, 0.0], &filters, 5).unwrap();
        assert_eq!(contents(&results), vec!["tiktok hook", "weak hook"]);

        let filters = RetrievalFilters {
            content_type: Some("hook".to_string()),
            min_performance_score: Some(0.5),
            ..RetrievalFilters::default()
        };
        let results = vault.retrieve("u1", &[1.0, 0.0], &filters, 5).unwrap();
        assert_eq!(contents(&results), vec!["tiktok hook"]);

        let malformed = RetrievalFilters {
            min_performance_score: Some(f64::NAN),
            ..RetrievalFilters::default()
        };
        assert!(vault.retrieve("u1", &[1.0, 0.0], &malformed, 5).is_err());
    }

    #[test]
    fn test_owner_scope_avoids_pool_exhaustion() {
        let global = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        let scoped =
            Vault::open_in_memory(VaultOptions::new(2).with_scope(RetrievalScope::Owner)).unwrap();

        let crowd: Vec<ContentItem> = (0..20)
            .map(|i| ContentItem::new(format!("crowd {}", i), vec![1.0, i as f32 * 0.001]))
            .collect();
        for vault in [&global, &scoped] {
            vault.index_items("u2", &crowd).unwrap();
            vault
                .index_items("u1", &[ContentItem::new("mine", vec![-1.0, 0.0])])
                .unwrap();
        }

        // the five nearest vectors all belong to u2
        let results = global
            .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 1)
            .unwrap();
        assert!(results.is_empty());

        let results = scoped
            .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 1)
            .unwrap();
        assert_eq!(contents(&results), vec!["mine"]);
    }

    #[test]
    fn test_positions_are_global_and_dense() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        vault
            .index_items("u1", &[ContentItem::new("a", vec![1.0, 0.0])])
            .unwrap();
        vault
            .index_items(
                "u2",
                &[
                    ContentItem::new("b", vec![0.0, 1.0]),
                    ContentItem::new("c", vec![1.0, 1.0]),
                ],
            )
            .unwrap();

        let rows = vault
            .retrieve_rows("u2", &[0.0, 1.0], &RetrievalFilters::default(), 5)
            .unwrap();
        let mut positions: Vec<u64> = rows.iter().map(|r| r.position).collect();
        positions.sort();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(vault.count("u1").unwrap(), 1);
        assert_eq!(vault.count("u2").unwrap(), 2);
        assert_invariant(&vault);
    }

    #[test]
    fn test_update_changes_ranking() {
        let vault = scenario_vault(RetrievalScope::Global);
        let rows = vault
            .retrieve_rows("u1", &[1.0, 0.0], &RetrievalFilters::default(), 3)
            .unwrap();
        let close = rows.iter().find(|r| r.content == "close").unwrap();

        let update = ItemUpdate {
            performance_score: Some(0.99),
            ..ItemUpdate::default()
        };
        vault.update_item(close.id, &update).unwrap();

        let results = vault
            .retrieve("u1", &[1.0, 0.0], &RetrievalFilters::default(), 1)
            .unwrap();
        assert_eq!(contents(&results), vec!["close"]);

        let item = vault.get_item(close.id).unwrap().unwrap();
        assert_eq!(item.position, close.position);

        assert!(matches!(
            vault.update_item(12345, &update),
            Err(VaultError::NotFound(12345))
        ));
    }

    #[test]
    fn test_metadata_failure_rolls_back_index() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        vault
            .state
            .read()
            .meta
            .lock()
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON embeddings
                 WHEN NEW.content = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = vault
            .index_items(
                "u1",
                &[
                    ContentItem::new("fine", vec![1.0, 0.0]),
                    ContentItem::new("wrong width", vec![1.0]),
                    ContentItem::new("boom", vec![0.0, 1.0]),
                    ContentItem::new("never reached", vec![1.0, 1.0]),
                ],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);

        let partial = err.partial_report().unwrap();
        assert_eq!(partial.indexed_count, 1);
        assert_eq!(partial.failures.len(), 1);
        assert_eq!(partial.failures[0].index, 1);
        assert_eq!(partial.failures[0].kind, ErrorKind::InvalidInput);

        assert_eq!(vault.len(), 1);
        assert_invariant(&vault);

        vault
            .index_items("u1", &[ContentItem::new("after", vec![0.5, 0.5])])
            .unwrap();
        assert_eq!(vault.len(), 2);
        assert_invariant(&vault);
    }

    #[test]
    fn test_concurrent_indexing_keeps_invariant() {
        let vault = Arc::new(Vault::open_in_memory(VaultOptions::new(3)).unwrap());

        let mut handles = vec![];
        for t in 0..8 {
            let vault = Arc::clone(&vault);
            handles.push(std::thread::spawn(move || {
                let owner = format!("owner-{}", t % 3);
                for i in 0..10 {
                    let item = ContentItem::new(format!("{}-{}", t, i), vec![t as f32, i as f32, 1.0]);
                    vault.index_items(&owner, &[item]).unwrap();
                }
            }));
        }
        for _ in 0..4 {
            let vault = Arc::clone(&vault);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    vault
                        .retrieve("owner-0", &[0.0, 0.0, 1.0], &RetrievalFilters::default(), 3)
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(vault.len(), 80);
        assert_invariant(&vault);
    }

    #[test]
    fn test_reload_waits_for_writers() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(
            Vault::open(StoragePaths::in_dir(dir.path()), VaultOptions::new(2)).unwrap(),
        );

        let writer = {
            let vault = Arc::clone(&vault);
            std::thread::spawn(move || {
                for round in 0..50 {
                    let batch: Vec<ContentItem> = (0..20)
                        .map(|i| {
                            ContentItem::new(format!("{}-{}", round, i), vec![round as f32, i as f32])
                        })
                        .collect();
                    vault.index_items("u1", &batch).unwrap();
                }
            })
        };

        for _ in 0..200 {
            vault.reload().unwrap();
            assert_invariant(&vault);
        }
        writer.join().unwrap();

        vault.reload().unwrap();
        assert_eq!(vault.len(), 1000);
        assert_invariant(&vault);
    }

    #[test]
    fn test_snapshots_during_writes_are_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live");
        let vault = Arc::new(Vault::open(StoragePaths::in_dir(&live), VaultOptions::new(2)).unwrap());

        let writer = {
            let vault = Arc::clone(&vault);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let item = ContentItem::new(format!("item {}", i), vec![i as f32, 1.0]);
                    vault.index_items("u1", &[item]).unwrap();
                }
            })
        };

        for n in 0..10 {
            let target = vault.snapshot(&dir.path().join(format!("snap-{}", n))).unwrap();
            let copy = Vault::open(target, VaultOptions::new(2)).unwrap();
            assert_invariant(&copy);
        }
        writer.join().unwrap();
        assert_invariant(&vault);
    }

    #[test]
    fn test_snapshot_refuses_live_files() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(StoragePaths::in_dir(dir.path()), VaultOptions::new(2)).unwrap();
        vault
            .index_items("u1", &[ContentItem::new("kept", vec![1.0, 0.0])])
            .unwrap();

        assert!(matches!(
            vault.snapshot(dir.path()),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            vault.snapshot(&dir.path().join(".")),
            Err(VaultError::InvalidInput(_))
        ));

        vault
            .index_items("u1", &[ContentItem::new("still writable", vec![0.0, 1.0])])
            .unwrap();
        assert_eq!(vault.len(), 2);
        assert_invariant(&vault);
    }

    #[test]
    fn test_in_memory_has_no_files() {
        let vault = Vault::open_in_memory(VaultOptions::new(2)).unwrap();
        assert!(matches!(vault.persist(), Err(VaultError::InvalidInput(_))));
        assert!(vault.storage().is_none());
    }

    #[test]
    fn test_stats() {
        let vault = scenario_vault(RetrievalScope::Global);
        vault
            .index_items("u2", &[ContentItem::new("x", vec![0.0, 0.0])])
            .unwrap();

        let stats = vault.stats().unwrap();
        assert_eq!(stats.dimension, 2);
        assert_eq!(stats.vectors, 4);
        assert_eq!(stats.items, 4);
        assert_eq!(stats.owners[0].owner_id, "u1");
        assert_eq!(stats.owners[0].items, 3);
        assert!(stats.last_indexed.is_some());
    }

    #[test]
    fn test_invalid_options() {
        assert!(Vault::open_in_memory(VaultOptions::new(0)).is_err());

        let mut options = VaultOptions::new(2);
        options.overfetch_factor = 0;
        assert!(Vault::open_in_memory(options).is_err());
    }
}
