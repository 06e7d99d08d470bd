//! YouTube access: URL resolution, playlist expansion and transcript retrieval.
//!
//! The network-facing pieces are traits ([`MetadataExtractor`], [`TranscriptFetcher`])
//! with yt-dlp backed implementations, so the scraping logic can run against fakes.

mod metadata;
mod resolver;
mod transcript;

pub use metadata::{MetadataExtractor, PlaylistEntry, YtDlpMetadataExtractor};
pub use resolver::{UrlResolver, VideoUrl};
pub use transcript::{
    RetryingFetcher, Transcript, TranscriptError, TranscriptFetcher, YtDlpTranscriptFetcher,
};

use crate::error::{Result, TubechatError};
use tokio::process::Command;
use tracing::debug;

/// Canonical watch-page URL for a video.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Run yt-dlp with the given arguments and return its stdout.
pub(crate) async fn run_ytdlp(program: &str, args: &[&str]) -> Result<String> {
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TubechatError::ToolNotFound(program.to_string())
            } else {
                TubechatError::ToolFailed(format!("Failed to run {}: {}", program, e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TubechatError::ToolFailed(stderr.trim().to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url() {
        assert_eq!(watch_url("abc123"), "https://www.youtube.com/watch?v=abc123");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let err = run_ytdlp("tubechat-definitely-missing-binary", &["--version"])
            .await
            .unwrap_err();
        assert!(matches!(err, TubechatError::ToolNotFound(_)));
    }
}
