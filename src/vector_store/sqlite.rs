//! SQLite-based vector index implementation.
//!
//! Metadata filters are evaluated in SQL; similarity is computed in Rust over the
//! filtered rows. Suitable for local use with modest amounts of content.

use super::{DistanceMetric, MetadataFilter, VectorEntry, VectorIndex, VectorMatch, VectorMetadata};
use crate::error::{Result, TubechatError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    dimension INTEGER NOT NULL,
    metric TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vectors (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    source TEXT NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    upserted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vectors_session_id ON vectors(session_id);
CREATE INDEX IF NOT EXISTS idx_vectors_video_id ON vectors(video_id);
"#;

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Open (or create) an index at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored vectors.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TubechatError::VectorIndex(format!("Failed to acquire lock: {}", e)))
    }

    fn config(conn: &Connection) -> Result<Option<(usize, DistanceMetric)>> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT dimension, metric FROM index_config WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((dimension, metric)) => {
                let metric: DistanceMetric = serde_json::from_value(serde_json::Value::String(metric))?;
                Ok(Some((dimension as usize, metric)))
            }
        }
    }

    /// Column holding a filterable metadata field.
    fn filter_column(field: &str) -> Result<&'static str> {
        match field {
            "session_id" => Ok("session_id"),
            "video_id" => Ok("video_id"),
            "source" => Ok("source"),
            "text" => Ok("text"),
            other => Err(TubechatError::InvalidInput(format!(
                "Unsupported filter field: {}",
                other
            ))),
        }
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn ensure_index(&self, dimension: usize, metric: DistanceMetric) -> Result<()> {
        let conn = self.lock()?;

        match Self::config(&conn)? {
            Some((existing, _)) if existing != dimension => Err(TubechatError::VectorIndex(format!(
                "Index has dimension {}, expected {}",
                existing, dimension
            ))),
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO index_config (id, dimension, metric) VALUES (1, ?1, ?2)",
                    params![dimension as i64, metric.to_string()],
                )?;
                info!("Created SQLite index (dimension {}, {})", dimension, metric);
                Ok(())
            }
        }
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize> {
        let conn = self.lock()?;

        if let Some((dimension, _)) = Self::config(&conn)? {
            if let Some(bad) = entries.iter().find(|e| e.values.len() != dimension) {
                return Err(TubechatError::VectorIndex(format!(
                    "Vector {} has dimension {}, index expects {}",
                    bad.id,
                    bad.values.len(),
                    dimension
                )));
            }
        }

        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        for entry in entries {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO vectors
                (id, session_id, video_id, source, text, embedding, upserted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    entry.id,
                    entry.metadata.session_id,
                    entry.metadata.video_id,
                    entry.metadata.source,
                    entry.metadata.text,
                    Self::embedding_to_bytes(&entry.values),
                    now,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Upserted {} vectors", entries.len());
        Ok(entries.len())
    }

    #[instrument(skip(self, vector, filter))]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let column = Self::filter_column(filter.field())?;
        let conn = self.lock()?;

        let metric = Self::config(&conn)?
            .map(|(_, metric)| metric)
            .unwrap_or_default();

        let sql = format!(
            "SELECT id, session_id, video_id, source, text, embedding FROM vectors WHERE {} = ?1",
            column
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![filter.value()], |row| {
            let embedding: Vec<u8> = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                VectorMetadata {
                    session_id: row.get(1)?,
                    video_id: row.get(2)?,
                    source: row.get(3)?,
                    text: row.get(4)?,
                },
                Self::bytes_to_embedding(&embedding),
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (id, metadata, embedding) = row?;
            matches.push(VectorMatch {
                id,
                score: metric.score(vector, &embedding),
                metadata: include_metadata.then_some(metadata),
            });
        }

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, session: &str, video: &str, values: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            values,
            metadata: VectorMetadata {
                text: format!("chunk {}", id),
                source: format!("https://www.youtube.com/watch?v={}", video),
                video_id: video.to_string(),
                session_id: session.to_string(),
            },
        }
    }

    #[test]
    fn test_embedding_bytes() {
        let values = vec![0.5, -1.25, 3.0];
        let bytes = SqliteVectorIndex::embedding_to_bytes(&values);
        assert_eq!(bytes.len(), 12);
        assert_eq!(SqliteVectorIndex::bytes_to_embedding(&bytes), values);
    }

    #[tokio::test]
    async fn test_filtered_query() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.ensure_index(2, DistanceMetric::Cosine).await.unwrap();

        index
            .upsert(&[
                entry("s1_v1_0", "s1", "v1", vec![1.0, 0.0]),
                entry("s1_v1_1", "s1", "v1", vec![0.6, 0.8]),
                entry("s2_v9_0", "s2", "v9", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = index
            .query(&[1.0, 0.0], 5, &MetadataFilter::session("s1"), true)
            .await
            .unwrap();

        let ids: Vec<_> = results.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["s1_v1_0", "s1_v1_1"]);
        let metadata = results[0].metadata.as_ref().unwrap();
        assert_eq!(metadata.text, "chunk s1_v1_0");
        assert_eq!(metadata.session_id, "s1");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_persistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");

        {
            let index = SqliteVectorIndex::new(&path).unwrap();
            index.ensure_index(2, DistanceMetric::Cosine).await.unwrap();
            let batch = [entry("a", "s1", "v1", vec![1.0, 0.0]), entry("b", "s1", "v1", vec![0.0, 1.0])];
            index.upsert(&batch).await.unwrap();
            index.upsert(&batch).await.unwrap();
            assert_eq!(index.count().unwrap(), 2);
        }

        let reopened = SqliteVectorIndex::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
        assert!(reopened.ensure_index(3, DistanceMetric::Cosine).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_filter_field() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        let err = index
            .query(&[1.0], 5, &MetadataFilter::eq("title", "x"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, TubechatError::InvalidInput(_)));
    }
}
