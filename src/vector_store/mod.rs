//! Vector index abstraction for Tubechat.
//!
//! Every entry carries the session it belongs to, and every query takes a
//! [`MetadataFilter`] that the backend applies while searching. There is no
//! unfiltered query, so one session can never read another session's chunks.

mod memory;
mod pinecone;
mod sqlite;

pub use memory::MemoryVectorIndex;
pub use pinecone::{PineconeIndex, API_KEY_ENV as PINECONE_API_KEY_ENV};
pub use sqlite::SqliteVectorIndex;

use crate::config::{Settings, VectorStoreProvider};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// Chunk text.
    #[serde(default)]
    pub text: String,
    /// Canonical URL of the source video.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub session_id: String,
}

impl VectorMetadata {
    /// Look up a metadata field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "text" => Some(&self.text),
            "source" => Some(&self.source),
            "video_id" => Some(&self.video_id),
            "session_id" => Some(&self.session_id),
            _ => None,
        }
    }
}

/// A vector with its ID and metadata. Upserted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// A query result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    /// Similarity score (higher is better).
    pub score: f32,
    /// Present when requested and stored.
    pub metadata: Option<VectorMetadata>,
}

/// Equality filter on a metadata field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    field: String,
    value: String,
}

impl MetadataFilter {
    pub fn eq(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Restrict results to one session.
    pub fn session(session_id: &str) -> Self {
        Self::eq("session_id", session_id)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the metadata satisfies this filter.
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        metadata.field(&self.field) == Some(self.value.as_str())
    }
}

/// Similarity metric of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

impl DistanceMetric {
    /// Score two vectors; higher means more similar.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Dotproduct => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                -dist
            }
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::Dotproduct => write!(f, "dotproduct"),
        }
    }
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Make sure the index exists with the given dimension and metric, creating it if absent.
    async fn ensure_index(&self, dimension: usize, metric: DistanceMetric) -> Result<()>;

    /// Insert or overwrite entries by ID. Returns the number written.
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// Nearest neighbours of `vector` among entries matching `filter`, best first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>>;
}

/// Build the vector index selected in the settings.
pub fn create_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match settings.vector_store.provider {
        VectorStoreProvider::Pinecone => Arc::new(PineconeIndex::from_env(&settings.vector_store)?),
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorIndex::new(&settings.sqlite_path())?),
        VectorStoreProvider::Memory => Arc::new(MemoryVectorIndex::new()),
    };
    Ok(index)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
