//! In-memory vector index implementation.
//!
//! Useful for testing and short-lived local runs.

use super::{DistanceMetric, MetadataFilter, VectorEntry, VectorIndex, VectorMatch};
use crate::error::{Result, TubechatError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector index.
pub struct MemoryVectorIndex {
    entries: RwLock<HashMap<String, VectorEntry>>,
    config: RwLock<Option<(usize, DistanceMetric)>>,
}

impl MemoryVectorIndex {
    /// Create a new in-memory vector index.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config: RwLock::new(None),
        }
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored IDs, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn lock_error<T>(e: std::sync::PoisonError<T>) -> TubechatError {
        TubechatError::VectorIndex(format!("Failed to acquire lock: {}", e))
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_index(&self, dimension: usize, metric: DistanceMetric) -> Result<()> {
        let mut config = self.config.write().map_err(Self::lock_error)?;
        match *config {
            Some((existing, _)) if existing != dimension => Err(TubechatError::VectorIndex(format!(
                "Index has dimension {}, expected {}",
                existing, dimension
            ))),
            Some(_) => Ok(()),
            None => {
                *config = Some((dimension, metric));
                Ok(())
            }
        }
    }

    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize> {
        if let Some((dimension, _)) = *self.config.read().map_err(Self::lock_error)? {
            if let Some(bad) = entries.iter().find(|e| e.values.len() != dimension) {
                return Err(TubechatError::VectorIndex(format!(
                    "Vector {} has dimension {}, index expects {}",
                    bad.id,
                    bad.values.len(),
                    dimension
                )));
            }
        }

        let mut store = self.entries.write().map_err(Self::lock_error)?;
        for entry in entries {
            store.insert(entry.id.clone(), entry.clone());
        }
        Ok(entries.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let metric = match *self.config.read().map_err(Self::lock_error)? {
            Some((_, metric)) => metric,
            None => DistanceMetric::default(),
        };

        let store = self.entries.read().map_err(Self::lock_error)?;

        let mut matches: Vec<VectorMatch> = store
            .values()
            .filter(|entry| filter.matches(&entry.metadata))
            .map(|entry| VectorMatch {
                id: entry.id.clone(),
                score: metric.score(vector, &entry.values),
                metadata: include_metadata.then(|| entry.metadata.clone()),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::VectorMetadata;

    fn entry(id: &str, session: &str, values: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            values,
            metadata: VectorMetadata {
                text: format!("text of {}", id),
                source: "https://www.youtube.com/watch?v=v".to_string(),
                video_id: "v".to_string(),
                session_id: session.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_memory_vector_index() {
        let index = MemoryVectorIndex::new();
        index.ensure_index(3, DistanceMetric::Cosine).await.unwrap();

        index
            .upsert(&[
                entry("a", "s1", vec![1.0, 0.0, 0.0]),
                entry("b", "s1", vec![0.0, 1.0, 0.0]),
                entry("c", "s2", vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.len(), 3);

        let results = index
            .query(&[1.0, 0.0, 0.0], 10, &MetadataFilter::session("s1"), true)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!(results[0].score > results[1].score);
        assert!(results.iter().all(|m| m.metadata.as_ref().unwrap().session_id == "s1"));

        let top1 = index
            .query(&[1.0, 0.0, 0.0], 1, &MetadataFilter::session("s1"), false)
            .await
            .unwrap();
        assert_eq!(top1.len(), 1);
        assert!(top1[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let index = MemoryVectorIndex::new();
        index.upsert(&[entry("a", "s1", vec![1.0, 0.0])]).await.unwrap();
        index.upsert(&[entry("a", "s1", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(index.ids(), vec!["a"]);
        let results = index
            .query(&[0.0, 1.0], 5, &MetadataFilter::session("s1"), false)
            .await
            .unwrap();
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_dimension_checks() {
        let index = MemoryVectorIndex::new();
        index.ensure_index(2, DistanceMetric::Cosine).await.unwrap();
        assert!(index.ensure_index(3, DistanceMetric::Cosine).await.is_err());
        assert!(index.upsert(&[entry("a", "s1", vec![1.0, 0.0, 0.0])]).await.is_err());
        assert!(index.is_empty());
    }
}
