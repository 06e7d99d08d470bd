//! Session-to-video registry.
//!
//! Records which videos were ingested into which session so clients can list
//! them. It is display-only: retrieval never consults it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Generate a fresh session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A video ingested into a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub video_id: String,
    pub title: Option<String>,
    pub url: String,
    pub added_at: DateTime<Utc>,
}

/// In-memory registry of each session's videos, in ingestion order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Vec<VideoEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a video under `session_id`.
    ///
    /// A video already listed for the session keeps its position; its title and
    /// URL are refreshed. Returns `true` if the video was new to the session.
    pub fn add_video(&self, session_id: &str, video_id: &str, title: Option<String>, url: &str) -> bool {
        let mut sessions = self.write();
        let videos = sessions.entry(session_id.to_string()).or_default();

        if let Some(existing) = videos.iter_mut().find(|v| v.video_id == video_id) {
            if title.is_some() {
                existing.title = title;
            }
            existing.url = url.to_string();
            return false;
        }

        videos.push(VideoEntry {
            video_id: video_id.to_string(),
            title,
            url: url.to_string(),
            added_at: Utc::now(),
        });
        true
    }

    /// Videos of a session; empty for an unknown session.
    pub fn videos(&self, session_id: &str) -> Vec<VideoEntry> {
        self.read().get(session_id).cloned().unwrap_or_default()
    }

    /// Known session ids, sorted.
    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // The map is always left consistent, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<VideoEntry>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<VideoEntry>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}
