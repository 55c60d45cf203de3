//! Embedded item data model
//!
//! `ContentItem` is what callers hand to the indexer, `EmbeddedItem` is a
//! committed row, `RetrievedItem` is what retrieval returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, VaultError, VaultResult};

/// Open key/value bag attached to every item
pub type Tags = serde_json::Map<String, serde_json::Value>;

/// Raw engagement counters. Any counter may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    /// Counters the score formula does not use. Their presence still counts
    /// as supplied data, so such metrics score from zero rather than neutral.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl RawMetrics {
    pub fn views(views: f64) -> Self {
        Self {
            views: Some(views),
            ..Self::default()
        }
    }

    /// True when no counter was supplied at all
    pub fn is_empty(&self) -> bool {
        self.views.is_none()
            && self.likes.is_none()
            && self.comments.is_none()
            && self.shares.is_none()
            && self.other.is_empty()
    }

    /// Reject negative or NaN counters
    pub fn validate(&self) -> VaultResult<()> {
        let counters = [
            ("views", self.views),
            ("likes", self.likes),
            ("comments", self.comments),
            ("shares", self.shares),
        ];
        for (name, value) in counters {
            if let Some(v) = value {
                if v.is_nan() || v < 0.0 {
                    return Err(VaultError::InvalidInput(format!(
                        "metric '{}' must be a non-negative number, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

fn default_platform() -> String {
    "unknown".to_string()
}

fn default_niche() -> String {
    "general".to_string()
}

fn default_content_type() -> String {
    "text".to_string()
}

/// One item of an indexing batch, with its externally computed vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub content: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_niche")]
    pub niche: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub tags: Tags,

    #[serde(default, alias = "performance", alias = "raw_metrics")]
    pub metrics: Option<RawMetrics>,

    pub vector: Vec<f32>,
}

impl ContentItem {
    pub fn new(content: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            content: content.into(),
            platform: default_platform(),
            niche: default_niche(),
            content_type: default_content_type(),
            tags: Tags::new(),
            metrics: None,
            vector,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = niche.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metrics(mut self, metrics: RawMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Fields written by a metadata insert. `position` comes from the vector index.
#[derive(Debug, Clone)]
pub struct NewItem<'a> {
    pub position: u64,
    pub owner_id: &'a str,
    pub platform: &'a str,
    pub niche: &'a str,
    pub content_type: &'a str,
    pub content: &'a str,
    pub tags: &'a Tags,
    pub performance_score: f64,
    pub created_at: DateTime<Utc>,
}

/// A committed row of the metadata store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedItem {
    pub id: i64,
    pub position: u64,
    pub owner_id: String,
    pub platform: String,
    pub niche: String,
    pub content_type: String,
    pub content: String,
    pub tags: Tags,
    pub performance_score: f64,
    pub created_at: DateTime<Utc>,
}

/// In-place amendment of the mutable metadata fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    pub platform: Option<String>,
    pub niche: Option<String>,
    pub content_type: Option<String>,
    pub tags: Option<Tags>,
    pub performance_score: Option<f64>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.platform.is_none()
            && self.niche.is_none()
            && self.content_type.is_none()
            && self.tags.is_none()
            && self.performance_score.is_none()
    }

    pub fn validate(&self) -> VaultResult<()> {
        if let Some(score) = self.performance_score {
            validate_score("performance_score", score)?;
        }
        for (name, value) in [
            ("platform", &self.platform),
            ("niche", &self.niche),
            ("content_type", &self.content_type),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(VaultError::InvalidInput(format!("{} must not be blank", name)));
            }
        }
        Ok(())
    }
}

/// Optional retrieval filters. The engine applies none by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalFilters {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, alias = "min_performance")]
    pub min_performance_score: Option<f64>,
}

impl RetrievalFilters {
    pub fn validate(&self) -> VaultResult<()> {
        for (name, value) in [
            ("platform", &self.platform),
            ("niche", &self.niche),
            ("content_type", &self.content_type),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(VaultError::InvalidInput(format!(
                    "filter '{}' must not be blank",
                    name
                )));
            }
        }
        if let Some(min) = self.min_performance_score {
            validate_score("min_performance_score", min)?;
        }
        Ok(())
    }
}

fn validate_score(name: &str, score: f64) -> VaultResult<()> {
    if !(0.0..=1.0).contains(&score) {
        return Err(VaultError::InvalidInput(format!(
            "{} must be within [0, 1], got {}",
            name, score
        )));
    }
    Ok(())
}

/// Retrieval result handed back to collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedItem {
    pub content: String,
    pub platform: String,
    pub niche: String,
    pub content_type: String,
    pub tags: Tags,
    pub performance_score: f64,
    pub created_at: DateTime<Utc>,
}

impl From<EmbeddedItem> for RetrievedItem {
    fn from(item: EmbeddedItem) -> Self {
        Self {
            content: item.content,
            platform: item.platform,
            niche: item.niche,
            content_type: item.content_type,
            tags: item.tags,
            performance_score: item.performance_score,
            created_at: item.created_at,
        }
    }
}

/// A batch item that was not indexed
#[derive(Debug, Clone, Serialize)]
pub struct IndexFailure {
    /// Offset of the item within the submitted batch
    pub index: usize,
    pub kind: ErrorKind,
    pub reason: String,
}

impl IndexFailure {
    pub fn new(index: usize, error: &VaultError) -> Self {
        Self {
            index,
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Outcome of an indexing batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub indexed_count: usize,
    pub failures: Vec<IndexFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_defaults() {
        let json = r#"{"content": "3 cafes in Lisbon", "vector": [0.1, 0.2]}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.platform, "unknown");
        assert_eq!(item.niche, "general");
        assert_eq!(item.content_type, "text");
        assert!(item.tags.is_empty());
        assert!(item.metrics.is_none());
    }

    #[test]
    fn test_performance_alias() {
        let json = r#"{"content": "hook", "vector": [1.0], "performance": {"views": 1200}}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        let metrics = item.metrics.unwrap();
        assert_eq!(metrics.views, Some(1200.0));
        assert!(metrics.likes.is_none());
    }

    #[test]
    fn test_unknown_counters_count_as_supplied() {
        let json = r#"{"content": "hook", "vector": [1.0], "metrics": {"watch_time": 10}}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        let metrics = item.metrics.unwrap();

        assert!(!metrics.is_empty());
        assert_eq!(metrics.other["watch_time"], 10);
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_metrics_validation() {
        assert!(RawMetrics::views(10.0).validate().is_ok());

        let negative = RawMetrics {
            likes: Some(-1.0),
            ..RawMetrics::default()
        };
        assert!(matches!(negative.validate(), Err(VaultError::InvalidInput(_))));

        let nan = RawMetrics {
            shares: Some(f64::NAN),
            ..RawMetrics::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_filter_validation() {
        assert!(RetrievalFilters::default().validate().is_ok());

        let blank = RetrievalFilters {
            niche: Some("  ".to_string()),
            ..RetrievalFilters::default()
        };
        assert!(blank.validate().is_err());

        let out_of_range = RetrievalFilters {
            min_performance_score: Some(1.5),
            ..RetrievalFilters::default()
        };
        assert!(out_of_range.validate().is_err());

        let nan = RetrievalFilters {
            min_performance_score: Some(f64::NAN),
            ..RetrievalFilters::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_update_validation() {
        assert!(ItemUpdate::default().is_empty());

        let update = ItemUpdate {
            performance_score: Some(0.7),
            ..ItemUpdate::default()
        };
        assert!(!update.is_empty());
        assert!(update.validate().is_ok());

        let bad = ItemUpdate {
            performance_score: Some(-0.1),
            ..ItemUpdate::default()
        };
        assert!(bad.validate().is_err());
    }
}
