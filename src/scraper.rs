//! Turns a YouTube URL into transcript records.
//!
//! One video's failure never affects the others: missing transcripts and
//! transport errors both drop that video from the output and are logged.

use crate::youtube::{watch_url, TranscriptError, TranscriptFetcher, UrlResolver};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Transcript of one successfully scraped video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub video_id: String,
    /// Watch-page URL, regardless of the URL the video was found through.
    pub canonical_url: String,
    pub text: String,
    /// Display title, when known.
    pub title: Option<String>,
}

/// Resolves a URL and fetches a transcript for every video it refers to.
pub struct Scraper {
    resolver: UrlResolver,
    fetcher: Arc<dyn TranscriptFetcher>,
    max_concurrent: usize,
}

impl Scraper {
    /// Create a scraper that fetches transcripts one at a time.
    pub fn new(resolver: UrlResolver, fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        Self {
            resolver,
            fetcher,
            max_concurrent: 1,
        }
    }

    /// Allow up to `max_concurrent` transcript fetches in flight.
    ///
    /// Output order stays the resolution order.
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Scrape every resolvable video behind `url`.
    #[instrument(skip(self))]
    pub async fn scrape(&self, url: &str) -> Vec<TranscriptRecord> {
        let video_ids = self.resolver.resolve(url).await;
        info!("Found {} videos to scrape", video_ids.len());

        let fetcher = &self.fetcher;
        let outcomes: Vec<_> = stream::iter(video_ids)
            .map(|video_id| async move {
                let result = fetcher.fetch(&video_id).await;
                (video_id, result)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let records: Vec<TranscriptRecord> = outcomes
            .into_iter()
            .filter_map(|(video_id, result)| match result {
                Ok(transcript) if !transcript.text.trim().is_empty() => Some(TranscriptRecord {
                    canonical_url: watch_url(&video_id),
                    video_id,
                    text: transcript.text,
                    title: transcript.title,
                }),
                Ok(_) => {
                    info!("Empty transcript for {}, skipping", video_id);
                    None
                }
                Err(e @ TranscriptError::Unavailable { .. }) => {
                    info!("Skipping video: {}", e);
                    None
                }
                Err(e @ TranscriptError::Transport { .. }) => {
                    warn!("Skipping video after transport failure: {}", e);
                    None
                }
                Err(e @ TranscriptError::Tool { .. }) => {
                    error!("Skipping video: {}", e);
                    None
                }
            })
            .collect();

        info!("Scraped {} transcripts", records.len());
        records
    }
}
