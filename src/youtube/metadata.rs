//! Playlist and channel expansion.

use super::run_ytdlp;
use crate::error::{Result, TubechatError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

/// One entry of a flat playlist listing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Lists the entries of a collection URL without fetching per-entry detail.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract_flat(&self, url: &str) -> Result<Vec<PlaylistEntry>>;
}

/// Metadata extractor backed by `yt-dlp --flat-playlist`.
pub struct YtDlpMetadataExtractor {
    program: String,
}

impl YtDlpMetadataExtractor {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn parse_listing(json: &str) -> Result<Vec<PlaylistEntry>> {
        #[derive(Deserialize)]
        struct FlatListing {
            #[serde(default)]
            entries: Vec<Option<PlaylistEntry>>,
        }

        let listing: FlatListing = serde_json::from_str(json).map_err(|e| {
            TubechatError::Resolve(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        Ok(listing.entries.into_iter().flatten().collect())
    }
}

impl Default for YtDlpMetadataExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl MetadataExtractor for YtDlpMetadataExtractor {
    #[instrument(skip(self))]
    async fn extract_flat(&self, url: &str) -> Result<Vec<PlaylistEntry>> {
        let stdout = run_ytdlp(
            &self.program,
            &[
                "--flat-playlist",
                "--dump-single-json",
                "--no-warnings",
                "--quiet",
                url,
            ],
        )
        .await?;

        Self::parse_listing(&stdout)
    }
}
