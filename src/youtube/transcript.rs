//! Transcript retrieval.
//!
//! Captions are located through yt-dlp's video metadata and downloaded in YouTube's
//! `json3` timed-text format. Failures are typed so callers can tell a video that
//! simply has no transcript apart from a transport problem worth retrying.

use super::{run_ytdlp, watch_url};
use crate::error::TubechatError;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// yt-dlp error fragments that mean the video itself is not accessible.
const PERMANENT_FAILURES: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video has been removed",
    "members-only",
    "Sign in to confirm your age",
    "This live event will begin",
];

/// Transcript text of one video.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub video_id: String,
    /// Video title, when the source reports one.
    pub title: Option<String>,
    /// All caption segments in order, joined by single spaces.
    pub text: String,
}

impl Transcript {
    /// Build a transcript from ordered caption segments.
    pub fn from_segments<S: AsRef<str>>(video_id: &str, title: Option<String>, segments: &[S]) -> Self {
        let text = segments
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            video_id: video_id.to_string(),
            title,
            text,
        }
    }
}

/// Why a transcript could not be retrieved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptError {
    /// No transcript exists, transcripts are disabled, or the video is inaccessible.
    #[error("no transcript for {video_id}: {reason}")]
    Unavailable { video_id: String, reason: String },

    /// Network failure, rate limiting or a malformed response.
    #[error("transcript request for {video_id} failed: {message}")]
    Transport { video_id: String, message: String },

    /// The retrieval tool itself is missing or broken.
    #[error("transcript tool failure for {video_id}: {message}")]
    Tool { video_id: String, message: String },
}

impl TranscriptError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TranscriptError::Transport { .. })
    }

    fn unavailable(video_id: &str, reason: impl Into<String>) -> Self {
        TranscriptError::Unavailable {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    fn transport(video_id: &str, message: impl Into<String>) -> Self {
        TranscriptError::Transport {
            video_id: video_id.to_string(),
            message: message.into(),
        }
    }
}

/// Retrieves the transcript of a single video.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str) -> std::result::Result<Transcript, TranscriptError>;
}

/// Transcript fetcher backed by yt-dlp metadata and YouTube's timed-text endpoint.
pub struct YtDlpTranscriptFetcher {
    program: String,
    languages: Vec<String>,
    http: reqwest::Client,
}

impl YtDlpTranscriptFetcher {
    pub fn new(program: &str, languages: Vec<String>) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            program: program.to_string(),
            languages,
            http,
        })
    }

    async fn video_info(&self, video_id: &str) -> std::result::Result<VideoInfo, TranscriptError> {
        let url = watch_url(video_id);
        let stdout = run_ytdlp(
            &self.program,
            &["--dump-json", "--skip-download", "--no-warnings", "--no-playlist", &url],
        )
        .await
        .map_err(|e| match e {
            TubechatError::ToolFailed(msg) => classify_failure(video_id, &msg),
            other => TranscriptError::Tool {
                video_id: video_id.to_string(),
                message: other.to_string(),
            },
        })?;

        serde_json::from_str(&stdout).map_err(|e| {
            TranscriptError::transport(video_id, format!("unreadable yt-dlp output: {}", e))
        })
    }

    async fn download_captions(
        &self,
        video_id: &str,
        url: &str,
    ) -> std::result::Result<Vec<String>, TranscriptError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TranscriptError::transport(video_id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptError::transport(
                video_id,
                format!("caption download returned {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TranscriptError::transport(video_id, e.to_string()))?;

        parse_json3(&body).map_err(|e| {
            TranscriptError::transport(video_id, format!("malformed caption payload: {}", e))
        })
    }
}

#[async_trait]
impl TranscriptFetcher for YtDlpTranscriptFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, video_id: &str) -> std::result::Result<Transcript, TranscriptError> {
        let info = self.video_info(video_id).await?;

        let caption_url = select_caption_url(&info, &self.languages)
            .ok_or_else(|| TranscriptError::unavailable(video_id, "no caption tracks"))?;

        let segments = self.download_captions(video_id, &caption_url).await?;
        if segments.is_empty() {
            return Err(TranscriptError::unavailable(video_id, "caption track is empty"));
        }

        debug!("Fetched {} caption segments", segments.len());
        Ok(Transcript::from_segments(video_id, info.title, segments.as_slice()))
    }
}

/// Retries transient failures of another fetcher with exponential backoff.
///
/// `Unavailable` and `Tool` errors are returned immediately.
pub struct RetryingFetcher {
    inner: Arc<dyn TranscriptFetcher>,
    retries: u32,
    backoff: Duration,
}

impl RetryingFetcher {
    pub fn new(inner: Arc<dyn TranscriptFetcher>, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

#[async_trait]
impl TranscriptFetcher for RetryingFetcher {
    async fn fetch(&self, video_id: &str) -> std::result::Result<Transcript, TranscriptError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.fetch(video_id).await {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = backoff_delay(self.backoff, attempt);
                    attempt += 1;
                    warn!(
                        "Retrying transcript for {} in {:?} (attempt {}/{}): {}",
                        video_id, delay, attempt, self.retries, e
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Delay before retry number `attempt + 1`, doubling up to 32x the base.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.pow(attempt.min(5)))
}

#[derive(Debug, Default, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitles: Option<BTreeMap<String, Vec<CaptionFormat>>>,
    #[serde(default)]
    automatic_captions: Option<BTreeMap<String, Vec<CaptionFormat>>>,
}

#[derive(Debug, Deserialize)]
struct CaptionFormat {
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

fn classify_failure(video_id: &str, message: &str) -> TranscriptError {
    if PERMANENT_FAILURES.iter().any(|p| message.contains(p)) {
        TranscriptError::unavailable(video_id, message)
    } else {
        TranscriptError::transport(video_id, message)
    }
}

fn json3_url(formats: &[CaptionFormat]) -> Option<String> {
    formats
        .iter()
        .find(|f| f.ext.as_deref() == Some("json3"))
        .and_then(|f| f.url.clone())
}

fn lookup_language(tracks: &BTreeMap<String, Vec<CaptionFormat>>, language: &str) -> Option<String> {
    let prefix = format!("{}-", language);
    tracks
        .iter()
        .filter(|(key, _)| key.as_str() == language || key.starts_with(&prefix))
        .find_map(|(_, formats)| json3_url(formats))
}

/// Whether a caption URL asks YouTube to machine-translate the track.
fn is_translated(caption_url: &str) -> bool {
    match Url::parse(caption_url) {
        Ok(parsed) => parsed.query_pairs().any(|(key, _)| key == "tlang"),
        Err(_) => caption_url.contains("tlang="),
    }
}

/// The automatic track in `language`, if that is the video's spoken language.
///
/// yt-dlp lists every auto-translate target next to the speech-recognition
/// track, so translated URLs are skipped.
fn lookup_original_automatic(
    tracks: &BTreeMap<String, Vec<CaptionFormat>>,
    language: &str,
) -> Option<String> {
    if let Some(url) = tracks
        .get(&format!("{}-orig", language))
        .and_then(|formats| json3_url(formats))
    {
        return Some(url);
    }

    let prefix = format!("{}-", language);
    tracks
        .iter()
        .filter(|(key, _)| key.as_str() == language || key.starts_with(&prefix))
        .filter_map(|(_, formats)| json3_url(formats))
        .find(|url| !is_translated(url))
}

/// Pick a caption track: manual tracks in a preferred language, then the automatic
/// track when the video is spoken in a preferred language, then any manual track,
/// then the original-language automatic track. Translated tracks are never used.
fn select_caption_url(info: &VideoInfo, languages: &[String]) -> Option<String> {
    let empty = BTreeMap::new();
    let manual = info.subtitles.as_ref().unwrap_or(&empty);
    let automatic = info.automatic_captions.as_ref().unwrap_or(&empty);

    languages
        .iter()
        .find_map(|lang| lookup_language(manual, lang))
        .or_else(|| {
            languages
                .iter()
                .find_map(|lang| lookup_original_automatic(automatic, lang))
        })
        .or_else(|| {
            manual
                .iter()
                .filter(|(key, _)| key.as_str() != "live_chat")
                .find_map(|(_, formats)| json3_url(formats))
        })
        .or_else(|| {
            automatic
                .iter()
                .filter(|(key, _)| key.ends_with("-orig"))
                .filter_map(|(_, formats)| json3_url(formats))
                .find(|url| !is_translated(url))
        })
}

/// Extract caption segments from a `json3` timed-text document.
fn parse_json3(body: &str) -> std::result::Result<Vec<String>, serde_json::Error> {
    #[derive(Deserialize)]
    struct Json3 {
        #[serde(default)]
        events: Vec<Json3Event>,
    }

    #[derive(Deserialize)]
    struct Json3Event {
        #[serde(default)]
        segs: Option<Vec<Json3Seg>>,
    }

    #[derive(Deserialize)]
    struct Json3Seg {
        #[serde(default)]
        utf8: String,
    }

    let doc: Json3 = serde_json::from_str(body)?;

    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| event.segs)
        .map(|segs| {
            let raw: String = segs.iter().map(|s| s.utf8.as_str()).collect();
            WHITESPACE.replace_all(raw.trim(), " ").into_owned()
        })
        .filter(|text| !text.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_from_segments_joins_with_single_space() {
        let t = Transcript::from_segments("vid", None, &["hello there", "general", "kenobi"]);
        assert_eq!(t.text, "hello there general kenobi");
    }

    #[test]
    fn test_parse_json3() {
        let body = r#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 1000, "id": 1},
                {"tStartMs": 0, "segs": [{"utf8": "Hello"}, {"utf8": " world"}]},
                {"tStartMs": 1500, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 2000, "segs": [{"utf8": "second\nline  here"}]}
            ]
        }"#;

        let segments = parse_json3(body).unwrap();
        assert_eq!(segments, vec!["Hello world", "second line here"]);
    }

    fn formats(url: &str) -> Vec<CaptionFormat> {
        vec![
            CaptionFormat {
                ext: Some("vtt".to_string()),
                url: Some(format!("{}&fmt=vtt", url)),
            },
            CaptionFormat {
                ext: Some("json3".to_string()),
                url: Some(format!("{}&fmt=json3", url)),
            },
        ]
    }

    #[test]
    fn test_select_prefers_manual_in_language() {
        let mut manual = BTreeMap::new();
        manual.insert("de".to_string(), formats("manual-de"));
        manual.insert("en-US".to_string(), formats("manual-en"));
        let mut automatic = BTreeMap::new();
        automatic.insert("en".to_string(), formats("auto-en"));

        let info = VideoInfo {
            title: None,
            subtitles: Some(manual),
            automatic_captions: Some(automatic),
        };

        let url = select_caption_url(&info, &["en".to_string()]).unwrap();
        assert_eq!(url, "manual-en&fmt=json3");
    }

    #[test]
    fn test_select_falls_back_to_automatic_then_original() {
        let mut automatic = BTreeMap::new();
        automatic.insert("af".to_string(), formats("https://www.youtube.com/api/timedtext?v=x&lang=fr&tlang=af"));
        automatic.insert("fr".to_string(), formats("https://www.youtube.com/api/timedtext?v=x&lang=fr"));
        automatic.insert("fr-orig".to_string(), formats("auto-fr-orig"));

        let info = VideoInfo {
            title: None,
            subtitles: None,
            automatic_captions: Some(automatic),
        };

        assert_eq!(
            select_caption_url(&info, &["fr".to_string()]).unwrap(),
            "auto-fr-orig&fmt=json3"
        );
        assert_eq!(
            select_caption_url(&info, &["en".to_string()]).unwrap(),
            "auto-fr-orig&fmt=json3"
        );
        assert_eq!(
            select_caption_url(&info, &["af".to_string()]).unwrap(),
            "auto-fr-orig&fmt=json3"
        );
    }

    #[test]
    fn test_select_skips_machine_translations() {
        let mut automatic = BTreeMap::new();
        automatic.insert("fr-orig".to_string(), formats("asr-fr"));
        automatic.insert("fr".to_string(), formats("asr-fr"));
        automatic.insert("en".to_string(), formats("asr-fr&tlang=en"));
        automatic.insert("de".to_string(), formats("asr-fr&tlang=de"));

        let info = VideoInfo {
            title: None,
            subtitles: None,
            automatic_captions: Some(automatic),
        };

        let url = select_caption_url(&info, &["en".to_string()]).unwrap();
        assert!(!url.contains("tlang"), "picked a translated track: {}", url);
        assert_eq!(url, "asr-fr&fmt=json3");
    }

    #[test]
    fn test_select_automatic_in_spoken_language() {
        let mut automatic = BTreeMap::new();
        automatic.insert("de".to_string(), formats("https://www.youtube.com/api/timedtext?v=x&lang=en&tlang=de"));
        automatic.insert("en".to_string(), formats("https://www.youtube.com/api/timedtext?v=x&lang=en"));

        let info = VideoInfo {
            title: None,
            subtitles: None,
            automatic_captions: Some(automatic),
        };

        assert_eq!(
            select_caption_url(&info, &["de".to_string(), "en".to_string()]).unwrap(),
            "https://www.youtube.com/api/timedtext?v=x&lang=en&fmt=json3"
        );
    }

    #[test]
    fn test_select_none_when_only_translations() {
        let mut automatic = BTreeMap::new();
        automatic.insert("en".to_string(), formats("asr&tlang=en"));

        let info = VideoInfo {
            title: None,
            subtitles: None,
            automatic_captions: Some(automatic),
        };

        assert!(select_caption_url(&info, &["en".to_string()]).is_none());
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), base);
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 40), Duration::from_millis(16000));
        assert_eq!(backoff_delay(Duration::MAX, 3), Duration::MAX);
    }

    #[test]
    fn test_select_none_when_disabled() {
        let mut manual = BTreeMap::new();
        manual.insert("live_chat".to_string(), formats("chat"));
        let info = VideoInfo {
            title: Some("Stream".to_string()),
            subtitles: Some(manual),
            automatic_captions: None,
        };
        assert!(select_caption_url(&info, &["en".to_string()]).is_none());
    }

    #[test]
    fn test_video_info_tolerates_nulls() {
        let info: VideoInfo =
            serde_json::from_str(r#"{"title": "T", "subtitles": null, "automatic_captions": {}}"#).unwrap();
        assert_eq!(info.title.as_deref(), Some("T"));
        assert!(select_caption_url(&info, &[]).is_none());
    }

    #[test]
    fn test_classify_failure() {
        assert!(!classify_failure("v", "ERROR: [youtube] v: Private video. Sign in").is_transient());
        assert!(classify_failure("v", "ERROR: HTTP Error 503: Service Unavailable").is_transient());
    }

    struct FlakyFetcher {
        calls: AtomicUsize,
        failures_before_success: usize,
        error: TranscriptError,
    }

    #[async_trait]
    impl TranscriptFetcher for FlakyFetcher {
        async fn fetch(&self, video_id: &str) -> std::result::Result<Transcript, TranscriptError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(self.error.clone())
            } else {
                Ok(Transcript::from_segments(video_id, None, &["ok"]))
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transport_errors() {
        let inner = Arc::new(FlakyFetcher {
            calls: AtomicUsize::new(0),
            failures_before_success: 2,
            error: TranscriptError::transport("v", "503"),
        });
        let fetcher = RetryingFetcher::new(inner.clone(), 2, Duration::ZERO);

        let transcript = fetcher.fetch("v").await.unwrap();
        assert_eq!(transcript.text, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_limit() {
        let inner = Arc::new(FlakyFetcher {
            calls: AtomicUsize::new(0),
            failures_before_success: 10,
            error: TranscriptError::transport("v", "timeout"),
        });
        let fetcher = RetryingFetcher::new(inner.clone(), 2, Duration::ZERO);

        assert!(fetcher.fetch("v").await.unwrap_err().is_transient());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unavailable_is_not_retried() {
        let inner = Arc::new(FlakyFetcher {
            calls: AtomicUsize::new(0),
            failures_before_success: 10,
            error: TranscriptError::unavailable("v", "transcripts disabled"),
        });
        let fetcher = RetryingFetcher::new(inner.clone(), 5, Duration::ZERO);

        let err = fetcher.fetch("v").await.unwrap_err();
        assert!(matches!(err, TranscriptError::Unavailable { .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
