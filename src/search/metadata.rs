//! Metadata store for embedded items
//!
//! Uses SQLite for persistence. Each row carries the `position` of its vector
//! in the flat index, which is the join key between the two stores. The
//! `embeddings` table doubles as the id -> position indirection table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::core::error::{VaultError, VaultResult};
use crate::core::item::{EmbeddedItem, ItemUpdate, NewItem, RetrievalFilters, Tags};

/// Schema migrations, applied in order. `PRAGMA user_version` records how many ran.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS embeddings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        position INTEGER NOT NULL,
        owner_id TEXT NOT NULL,
        platform TEXT NOT NULL,
        niche TEXT NOT NULL,
        content_type TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '{}',
        performance_score REAL NOT NULL DEFAULT 0.0,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_owner_platform ON embeddings(owner_id, platform);
    CREATE INDEX IF NOT EXISTS idx_owner_niche ON embeddings(owner_id, niche);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vault_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_owner_score ON embeddings(owner_id, performance_score DESC);
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_position ON embeddings(position);
    "#,
];

const ITEM_COLUMNS: &str = "id, position, owner_id, platform, niche, content_type, content, \
                            tags, performance_score, created_at";

/// Row count and position range, used by integrity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSummary {
    pub rows: u64,
    pub distinct: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
}

pub struct MetadataStore {
    pub(crate) conn: Connection,
}

impl MetadataStore {
    /// Open or create the metadata database
    pub fn open(path: &Path) -> VaultResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            VaultError::StorageUnavailable(format!(
                "failed to open metadata database {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> VaultResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> VaultResult<Self> {
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Apply pending schema migrations
    fn migrate(&self) -> VaultResult<()> {
        let applied = self.schema_version()?;

        for (version, sql) in MIGRATIONS.iter().enumerate().skip(applied) {
            self.conn.execute_batch(sql)?;
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {}", version + 1))?;
        }

        Ok(())
    }

    pub fn schema_version(&self) -> VaultResult<usize> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version as usize)
    }

    /// Insert a row and return its new id
    pub fn insert(&self, item: &NewItem<'_>) -> VaultResult<i64> {
        let tags = serde_json::to_string(item.tags)
            .map_err(|e| VaultError::InvalidInput(format!("tags are not serializable: {}", e)))?;

        self.conn.execute(
            r#"
            INSERT INTO embeddings
                (position, owner_id, platform, niche, content_type, content, tags,
                 performance_score, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                item.position as i64,
                item.owner_id,
                item.platform,
                item.niche,
                item.content_type,
                item.content,
                tags,
                item.performance_score,
                format_timestamp(&item.created_at),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Amend the mutable fields of a row
    pub fn update(&self, id: i64, update: &ItemUpdate) -> VaultResult<()> {
        update.validate()?;

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(ref platform) = update.platform {
            assignments.push("platform = ?");
            values.push(platform.clone().into());
        }
        if let Some(ref niche) = update.niche {
            assignments.push("niche = ?");
            values.push(niche.clone().into());
        }
        if let Some(ref content_type) = update.content_type {
            assignments.push("content_type = ?");
            values.push(content_type.clone().into());
        }
        if let Some(ref tags) = update.tags {
            let json = serde_json::to_string(tags).map_err(|e| {
                VaultError::InvalidInput(format!("tags are not serializable: {}", e))
            })?;
            assignments.push("tags = ?");
            values.push(json.into());
        }
        if let Some(score) = update.performance_score {
            assignments.push("performance_score = ?");
            values.push(score.into());
        }

        if assignments.is_empty() {
            return match self.get(id)? {
                Some(_) => Ok(()),
                None => Err(VaultError::NotFound(id)),
            };
        }

        let sql = format!(
            "UPDATE embeddings SET {} WHERE id = ?",
            assignments.join(", ")
        );
        values.push(id.into());

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(VaultError::NotFound(id));
        }
        Ok(())
    }

    pub fn get(&self, id: i64) -> VaultResult<Option<EmbeddedItem>> {
        let sql = format!("SELECT {} FROM embeddings WHERE id = ?1", ITEM_COLUMNS);
        let item = self
            .conn
            .query_row(&sql, [id], row_to_item)
            .optional()?;
        Ok(item)
    }

    /// Owner's rows among the candidate positions, filtered, best score first.
    ///
    /// An empty `positions` slice drops the position constraint.
    pub fn query(
        &self,
        owner_id: &str,
        positions: &[u64],
        filters: &RetrievalFilters,
        limit: usize,
    ) -> VaultResult<Vec<EmbeddedItem>> {
        let mut sql = format!("SELECT {} FROM embeddings WHERE owner_id = ?", ITEM_COLUMNS);
        let mut values: Vec<rusqlite::types::Value> = vec![owner_id.to_string().into()];

        if !positions.is_empty() {
            // one JSON parameter instead of one placeholder per candidate
            sql.push_str(" AND position IN (SELECT value FROM json_each(?))");
            let json = serde_json::to_string(positions)
                .map_err(|e| VaultError::InvalidInput(e.to_string()))?;
            values.push(json.into());
        }
        if let Some(ref platform) = filters.platform {
            sql.push_str(" AND platform = ?");
            values.push(platform.clone().into());
        }
        if let Some(ref niche) = filters.niche {
            sql.push_str(" AND niche = ?");
            values.push(niche.clone().into());
        }
        if let Some(ref content_type) = filters.content_type {
            sql.push_str(" AND content_type = ?");
            values.push(content_type.clone().into());
        }
        if let Some(min) = filters.min_performance_score {
            sql.push_str(" AND performance_score >= ?");
            values.push(min.into());
        }

        sql.push_str(" ORDER BY performance_score DESC, position ASC LIMIT ?");
        values.push((limit.min(i64::MAX as usize) as i64).into());

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values), row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Number of rows belonging to an owner
    pub fn count(&self, owner_id: &str) -> VaultResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE owner_id = ?1",
            [owner_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_all(&self) -> VaultResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Positions of an owner's vectors, ascending
    pub fn positions_for_owner(&self, owner_id: &str) -> VaultResult<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT position FROM embeddings WHERE owner_id = ?1 ORDER BY position")?;
        let positions = stmt
            .query_map([owner_id], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|p| p as u64))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    /// Item count per owner, largest first
    pub fn owners(&self) -> VaultResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner_id, COUNT(*) AS n FROM embeddings GROUP BY owner_id ORDER BY n DESC, owner_id",
        )?;
        let owners = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    pub fn position_summary(&self) -> VaultResult<PositionSummary> {
        let summary = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT position), MIN(position), MAX(position) FROM embeddings",
            [],
            |row| {
                let rows: i64 = row.get(0)?;
                let distinct: i64 = row.get(1)?;
                let min: Option<i64> = row.get(2)?;
                let max: Option<i64> = row.get(3)?;
                Ok(PositionSummary {
                    rows: rows as u64,
                    distinct: distinct as u64,
                    min: min.map(|v| v as u64),
                    max: max.map(|v| v as u64),
                })
            },
        )?;
        Ok(summary)
    }

    pub fn get_meta(&self, key: &str) -> VaultResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM vault_meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> VaultResult<()> {
        self.conn.execute(
            "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Write a consistent copy of the database to `path`
    pub fn backup_to(&self, path: &Path) -> VaultResult<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let target = path.to_string_lossy().to_string();
        self.conn.execute("VACUUM INTO ?1", [target])?;
        Ok(())
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<EmbeddedItem> {
    let position: i64 = row.get(1)?;
    let tags_json: String = row.get(7)?;
    let tags: Tags = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_raw: String = row.get(9)?;
    let created_at = parse_timestamp(&created_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{}'", created_raw).into(),
        )
    })?;

    Ok(EmbeddedItem {
        id: row.get(0)?,
        position: position as u64,
        owner_id: row.get(2)?,
        platform: row.get(3)?,
        niche: row.get(4)?,
        content_type: row.get(5)?,
        content: row.get(6)?,
        tags,
        performance_score: row.get(8)?,
        created_at,
    })
}
