//! Pipeline coordination for Tubechat.
//!
//! Wires scraping, ingestion and retrieval together behind the two operations
//! the outer surfaces need: ingest a URL into a session, and answer a question
//! for a session.

use crate::chunking::TextSplitter;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, TubechatError};
use crate::ingest::{IngestReport, IngestionEngine};
use crate::rag::{ChatModel, ContextBuilder, OpenAIChatModel, RagEngine, RagResponse};
use crate::scraper::Scraper;
use crate::session::new_session_id;
use crate::vector_store::{create_index, DistanceMetric, VectorIndex};
use crate::youtube::{
    MetadataExtractor, RetryingFetcher, TranscriptFetcher, UrlResolver, YtDlpMetadataExtractor,
    YtDlpTranscriptFetcher,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// A video that was ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedVideo {
    pub video_id: String,
    pub title: Option<String>,
    pub url: String,
}

/// Result of ingesting a URL.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub session_id: String,
    /// Videos with a transcript, in resolution order.
    pub videos: Vec<IngestedVideo>,
    pub report: IngestReport,
}

/// Capability implementations the pipeline is built from.
pub struct Components {
    pub extractor: Arc<dyn MetadataExtractor>,
    pub fetcher: Arc<dyn TranscriptFetcher>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub chat: Arc<dyn ChatModel>,
    pub prompts: Prompts,
}

/// The scrape → ingest → answer pipeline.
pub struct Pipeline {
    scraper: Scraper,
    ingestion: IngestionEngine,
    rag: RagEngine,
}

impl Pipeline {
    /// Build the pipeline from settings, creating the vector index if needed.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let youtube = &settings.youtube;

        let extractor = Arc::new(YtDlpMetadataExtractor::new(&youtube.ytdlp_path));
        let fetcher = Arc::new(RetryingFetcher::new(
            Arc::new(YtDlpTranscriptFetcher::new(
                &youtube.ytdlp_path,
                youtube.languages.clone(),
            )?),
            youtube.fetch_retries,
            Duration::from_millis(youtube.retry_backoff_ms),
        ));

        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);

        let index = create_index(settings)?;
        info!(
            "Using {} vector index ({} dims)",
            settings.vector_store.provider,
            embedder.dimensions()
        );
        index
            .ensure_index(embedder.dimensions(), DistanceMetric::Cosine)
            .await?;

        let chat = Arc::new(OpenAIChatModel::from_settings(&settings.rag)?);
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;

        Ok(Self::with_components(
            settings,
            Components {
                extractor,
                fetcher,
                embedder,
                index,
                chat,
                prompts,
            },
        ))
    }

    /// Build the pipeline from explicit components.
    pub fn with_components(settings: &Settings, components: Components) -> Self {
        let scraper = Scraper::new(UrlResolver::new(components.extractor), components.fetcher)
            .with_concurrency(settings.youtube.max_concurrent_fetches);

        let ingestion = IngestionEngine::new(components.embedder.clone(), components.index.clone())
            .with_splitter(TextSplitter::new(
                settings.chunking.max_len,
                settings.chunking.overlap,
            ))
            .with_batch_size(settings.vector_store.upsert_batch_size);

        let context_builder = ContextBuilder::new(components.index, components.embedder)
            .with_top_k(settings.vector_store.top_k);
        let rag = RagEngine::new(context_builder, components.chat).with_prompts(components.prompts);

        Self {
            scraper,
            ingestion,
            rag,
        }
    }

    /// Scrape `url` and ingest its transcripts into a session.
    ///
    /// Without a session id a new one is generated. A given session id must not
    /// contain `_`. Fails with [`TubechatError::NoContent`] when no video behind
    /// the URL has a transcript.
    #[instrument(skip(self))]
    pub async fn ingest_url(&self, url: &str, session_id: Option<&str>) -> Result<IngestOutcome> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TubechatError::InvalidInput("URL must not be empty".to_string()));
        }

        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            // Vector ids join session and video with '_', and video ids may contain it.
            Some(id) if id.contains('_') => {
                return Err(TubechatError::InvalidInput(format!(
                    "Session id must not contain '_': {}",
                    id
                )));
            }
            Some(id) => id.to_string(),
            None => new_session_id(),
        };

        let records = self.scraper.scrape(url).await;
        if records.is_empty() {
            return Err(TubechatError::NoContent(format!(
                "No transcripts could be retrieved from {}",
                url
            )));
        }

        let report = self.ingestion.ingest(&session_id, &records).await?;

        let videos = records
            .into_iter()
            .map(|r| IngestedVideo {
                video_id: r.video_id,
                title: r.title,
                url: r.canonical_url,
            })
            .collect();

        Ok(IngestOutcome {
            session_id,
            videos,
            report,
        })
    }

    /// Answer a question from a session's content.
    pub async fn answer(&self, session_id: &str, question: &str) -> Result<String> {
        self.rag.answer(session_id, question).await
    }

    /// Answer a question and return the excerpts used.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<RagResponse> {
        self.rag.ask(session_id, question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoChat, HashEmbedder};
    use crate::vector_store::MemoryVectorIndex;
    use crate::youtube::{PlaylistEntry, Transcript, TranscriptError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio_test::assert_err;

    struct Playlist(Vec<&'static str>);

    #[async_trait]
    impl MetadataExtractor for Playlist {
        async fn extract_flat(&self, _url: &str) -> Result<Vec<PlaylistEntry>> {
            Ok(self
                .0
                .iter()
                .map(|id| PlaylistEntry {
                    id: Some(id.to_string()),
                    title: None,
                })
                .collect())
        }
    }

    struct Library(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl TranscriptFetcher for Library {
        async fn fetch(&self, video_id: &str) -> std::result::Result<Transcript, TranscriptError> {
            match self.0.get(video_id) {
                Some(text) => Ok(Transcript::from_segments(
                    video_id,
                    Some(format!("Video {}", video_id)),
                    &[*text],
                )),
                None => Err(TranscriptError::Unavailable {
                    video_id: video_id.to_string(),
                    reason: "transcripts disabled".to_string(),
                }),
            }
        }
    }

    fn pipeline(playlist: Vec<&'static str>, library: &[(&'static str, &'static str)]) -> Pipeline {
        Pipeline::with_components(
            &Settings::default(),
            Components {
                extractor: Arc::new(Playlist(playlist)),
                fetcher: Arc::new(Library(library.iter().copied().collect())),
                embedder: Arc::new(HashEmbedder::new(64)),
                index: Arc::new(MemoryVectorIndex::new()),
                chat: Arc::new(EchoChat::default()),
                prompts: Prompts::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_ingest_playlist_then_answer() {
        let pipeline = pipeline(
            vec!["v1", "v2", "v3"],
            &[("v1", "Tides follow the moon."), ("v3", "Comets have icy cores.")],
        );

        let outcome = pipeline
            .ingest_url("https://www.youtube.com/playlist?list=PL1", None)
            .await
            .unwrap();

        assert!(uuid::Uuid::parse_str(&outcome.session_id).is_ok());
        assert_eq!(
            outcome.videos,
            vec![
                IngestedVideo {
                    video_id: "v1".to_string(),
                    title: Some("Video v1".to_string()),
                    url: "https://www.youtube.com/watch?v=v1".to_string(),
                },
                IngestedVideo {
                    video_id: "v3".to_string(),
                    title: Some("Video v3".to_string()),
                    url: "https://www.youtube.com/watch?v=v3".to_string(),
                },
            ]
        );
        assert_eq!(outcome.report.chunks, 2);

        let answer = pipeline
            .answer(&outcome.session_id, "What do comets have?")
            .await
            .unwrap();
        assert!(answer.contains("Comets have icy cores."));
    }

    #[tokio::test]
    async fn test_ingest_keeps_given_session() {
        let pipeline = pipeline(vec![], &[("abc", "words")]);
        let outcome = pipeline
            .ingest_url("https://youtu.be/abc", Some("mine"))
            .await
            .unwrap();
        assert_eq!(outcome.session_id, "mine");
    }

    #[tokio::test]
    async fn test_session_with_underscore_is_rejected() {
        let pipeline = pipeline(vec![], &[("b_c", "first"), ("c", "second")]);

        let err = assert_err!(pipeline.ingest_url("https://youtu.be/c", Some("a_b")).await);
        assert!(matches!(err, TubechatError::InvalidInput(_)));

        let outcome = pipeline
            .ingest_url("https://youtu.be/b_c", Some("a"))
            .await
            .unwrap();
        assert_eq!(outcome.report.upserted, 1);
    }

    #[tokio::test]
    async fn test_no_content() {
        let pipeline = pipeline(vec!["v1"], &[]);
        let err = assert_err!(
            pipeline
                .ingest_url("https://www.youtube.com/playlist?list=PL1", Some("s1"))
                .await
        );
        assert!(matches!(err, TubechatError::NoContent(_)));

        let answer = pipeline.answer("s1", "Anything?").await.unwrap();
        assert_eq!(answer, Prompts::default().rag.fallback);
    }
}
