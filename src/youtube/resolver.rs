//! Classifies YouTube URLs and expands them into video IDs.

use super::MetadataExtractor;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use url::Url;

const SHORT_LINK_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];
const CANONICAL_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com"];

/// Shape of a YouTube URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoUrl {
    /// A single video (watch page, short link or shorts page).
    Single(String),
    /// Anything else: playlist, channel, or an unrecognised URL.
    Collection(String),
}

impl VideoUrl {
    /// Classify a URL without touching the network.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Self::single_video_id(input) {
            Some(id) => VideoUrl::Single(id),
            None => VideoUrl::Collection(input.to_string()),
        }
    }

    fn single_video_id(input: &str) -> Option<String> {
        let url = Url::parse(input).ok()?;
        let host = url.host_str()?.to_lowercase();

        if SHORT_LINK_HOSTS.contains(&host.as_str()) {
            return url
                .path_segments()?
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }

        if CANONICAL_HOSTS.contains(&host.as_str()) {
            if url.path() == "/watch" {
                return url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
                    .filter(|v| !v.is_empty());
            }

            if url.path().starts_with("/shorts/") {
                return url
                    .path_segments()?
                    .nth(1)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
            }
        }

        None
    }
}

/// Resolves a URL into the IDs of the videos it refers to.
pub struct UrlResolver {
    extractor: Arc<dyn MetadataExtractor>,
}

impl UrlResolver {
    pub fn new(extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolve a URL to video IDs, in playlist order.
    ///
    /// Single-video URLs resolve locally. Collections are expanded through the
    /// metadata extractor; if that fails the result is empty rather than an error.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> Vec<String> {
        match VideoUrl::parse(url) {
            VideoUrl::Single(id) => vec![id],
            VideoUrl::Collection(url) => match self.extractor.extract_flat(&url).await {
                Ok(entries) => {
                    let ids: Vec<String> = entries
                        .into_iter()
                        .filter_map(|entry| entry.id)
                        .filter(|id| !id.is_empty())
                        .collect();
                    debug!("Collection expanded to {} videos", ids.len());
                    ids
                }
                Err(e) => {
                    error!("Error fetching playlist info for {}: {}", url, e);
                    Vec::new()
                }
            },
        }
    }
}
