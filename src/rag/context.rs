//! Context building for RAG responses.

use super::ContextChunk;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{MetadataFilter, VectorIndex};
use std::sync::Arc;
use tracing::debug;

/// Default number of excerpts retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Retrieves a session's excerpts relevant to a question.
pub struct ContextBuilder {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl ContextBuilder {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set the number of matches requested from the index.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Retrieve excerpts for `query` from `session_id` only, in index order.
    pub async fn build(&self, session_id: &str, query: &str) -> Result<Vec<ContextChunk>> {
        let query_embedding = self.embedder.embed(query).await?;

        let matches = self
            .index
            .query(&query_embedding, self.top_k, &MetadataFilter::session(session_id), true)
            .await?;
        let returned = matches.len();

        let chunks: Vec<ContextChunk> = matches.into_iter().filter_map(ContextChunk::from_match).collect();
        debug!("{} of {} matches carry usable text", chunks.len(), returned);

        Ok(chunks)
    }
}

/// Join excerpt texts into one context block, separated by blank lines.
pub fn format_context_for_prompt(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format excerpts for display to the user.
pub fn format_context_for_display(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("{} (score: {:.2})", chunk.source, chunk.score))
        .collect::<Vec<_>>()
        .join("\n")
}
