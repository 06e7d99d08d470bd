//! RAG (Retrieval-Augmented Generation) for question answering over a session's videos.
//!
//! Retrieval is always filtered to the asking session, and answers are generated
//! from the retrieved transcript excerpts only.

mod chat;
pub mod context;
mod response;

pub use chat::{ChatModel, OpenAIChatModel};
pub use context::ContextBuilder;
pub use response::{RagEngine, RagResponse};

use crate::vector_store::VectorMatch;

/// A retrieved transcript excerpt.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChunk {
    pub video_id: String,
    /// Canonical URL of the source video.
    pub source: String,
    pub text: String,
    /// Similarity score.
    pub score: f32,
}

impl ContextChunk {
    /// Convert a match, dropping it when it carries no usable text.
    pub fn from_match(m: VectorMatch) -> Option<Self> {
        let metadata = m.metadata?;
        if metadata.text.trim().is_empty() {
            return None;
        }
        Some(Self {
            video_id: metadata.video_id,
            source: metadata.source,
            text: metadata.text,
            score: m.score,
        })
    }
}
