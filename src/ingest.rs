//! Persisting scraped transcripts as session-tagged vectors.

use crate::chunking::TextSplitter;
use crate::embedding::Embedder;
use crate::error::{Result, TubechatError};
use crate::scraper::TranscriptRecord;
use crate::vector_store::{VectorEntry, VectorIndex, VectorMetadata};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Default number of vectors per upsert request.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;

/// ID of the vector for chunk `chunk_index` of a video within a session.
///
/// This is the overwrite key: ingesting the same video into the same session
/// again replaces the earlier vectors instead of adding new ones.
/// Video ids may contain `_`, so ids stay unambiguous only for session ids
/// without it; [`Pipeline::ingest_url`](crate::pipeline::Pipeline::ingest_url)
/// rejects those.
pub fn vector_id(session_id: &str, video_id: &str, chunk_index: usize) -> String {
    format!("{}_{}_{}", session_id, video_id, chunk_index)
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records that produced at least one chunk.
    pub videos: usize,
    pub chunks: usize,
    /// Vectors the index acknowledged.
    pub upserted: usize,
}

/// Chunks, embeds and upserts transcripts.
pub struct IngestionEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    splitter: TextSplitter,
    batch_size: usize,
}

impl IngestionEngine {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            splitter: TextSplitter::default(),
            batch_size: DEFAULT_UPSERT_BATCH_SIZE,
        }
    }

    pub fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Set the upsert group size (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Ingest `records` into `session_id`.
    ///
    /// Groups are upserted one after another; the first failing group aborts the
    /// rest and its error is returned. Groups already written stay written.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn ingest(&self, session_id: &str, records: &[TranscriptRecord]) -> Result<IngestReport> {
        if session_id.trim().is_empty() {
            return Err(TubechatError::InvalidInput("Session id must not be empty".to_string()));
        }

        let mut report = IngestReport::default();
        let mut entries = Vec::new();

        for record in records {
            let record_entries = self.entries_for(session_id, record).await?;
            if !record_entries.is_empty() {
                report.videos += 1;
            }
            entries.extend(record_entries);
        }

        report.chunks = entries.len();

        if entries.is_empty() {
            warn!("No chunks produced for session {}, nothing to ingest", session_id);
            return Ok(report);
        }

        let groups = entries.len().div_ceil(self.batch_size);
        for (n, group) in entries.chunks(self.batch_size).enumerate() {
            match self.index.upsert(group).await {
                Ok(count) => {
                    debug!("Upserted group {}/{} ({} vectors)", n + 1, groups, count);
                    report.upserted += count;
                }
                Err(e) => {
                    error!("Upsert of group {}/{} failed: {}", n + 1, groups, e);
                    return Err(e);
                }
            }
        }

        info!(
            "Ingested {} chunks from {} videos into session {}",
            report.chunks, report.videos, session_id
        );
        Ok(report)
    }

    /// Chunk and embed one record.
    async fn entries_for(&self, session_id: &str, record: &TranscriptRecord) -> Result<Vec<VectorEntry>> {
        let chunks = self.splitter.split(&record.text);
        if chunks.is_empty() {
            debug!("Transcript for {} produced no chunks", record.video_id);
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(TubechatError::Embedding(format!(
                "Expected {} embeddings for {}, received {}",
                chunks.len(),
                record.video_id,
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, values))| VectorEntry {
                id: vector_id(session_id, &record.video_id, i),
                values,
                metadata: VectorMetadata {
                    text,
                    source: record.canonical_url.clone(),
                    video_id: record.video_id.clone(),
                    session_id: session_id.to_string(),
                },
            })
            .collect())
    }
}
