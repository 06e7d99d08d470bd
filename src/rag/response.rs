//! RAG response generation.

use super::chat::ChatModel;
use super::context::{format_context_for_display, format_context_for_prompt};
use super::{ContextBuilder, ContextChunk};
use crate::config::Prompts;
use crate::error::{Result, TubechatError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// RAG engine for question answering.
///
/// Every call is independent: there is no conversation history, only the
/// vectors already stored for the session.
pub struct RagEngine {
    context_builder: ContextBuilder,
    chat: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl RagEngine {
    pub fn new(context_builder: ContextBuilder, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            context_builder,
            chat,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts.
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Answer `question` from the content ingested into `session_id`.
    pub async fn answer(&self, session_id: &str, question: &str) -> Result<String> {
        Ok(self.ask(session_id, question).await?.answer)
    }

    /// Answer `question` and also return the excerpts it was grounded on.
    ///
    /// When the session has no usable excerpts the fallback message is returned
    /// without calling the model.
    #[instrument(skip(self), fields(session = %session_id))]
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<RagResponse> {
        if session_id.trim().is_empty() {
            return Err(TubechatError::InvalidInput("Session id must not be empty".to_string()));
        }
        if question.trim().is_empty() {
            return Err(TubechatError::InvalidInput("Question must not be empty".to_string()));
        }

        info!("Processing question: {}", question);

        let context_chunks = self.context_builder.build(session_id, question).await?;

        if context_chunks.is_empty() {
            info!("No context in session {}, returning fallback", session_id);
            return Ok(RagResponse {
                answer: self.prompts.rag.fallback.clone(),
                sources: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), format_context_for_prompt(&context_chunks));
        let system = Prompts::render(&self.prompts.rag.system, &vars);

        let answer = self.chat.complete(&system, question).await?;

        debug!("Generated response with {} sources", context_chunks.len());

        Ok(RagResponse {
            answer,
            sources: context_chunks,
        })
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// Excerpts the answer was generated from.
    pub sources: Vec<ContextChunk>,
}

impl RagResponse {
    /// Format the response for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            output.push_str(&format_context_for_display(&self.sources));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestionEngine;
    use crate::scraper::TranscriptRecord;
    use crate::testing::{EchoChat, HashEmbedder};
    use crate::vector_store::MemoryVectorIndex;
    use tokio_test::assert_err;

    struct Fixture {
        engine: RagEngine,
        chat: Arc<EchoChat>,
    }

    async fn fixture(sessions: &[(&str, &str, &str)]) -> Fixture {
        let index = Arc::new(MemoryVectorIndex::new());
        let embedder = Arc::new(HashEmbedder::new(64));
        let ingestion = IngestionEngine::new(embedder.clone(), index.clone());

        for (session, video, text) in sessions {
            let record = TranscriptRecord {
                video_id: video.to_string(),
                canonical_url: format!("https://www.youtube.com/watch?v={}", video),
                text: text.to_string(),
                title: None,
            };
            ingestion.ingest(session, &[record]).await.unwrap();
        }

        let chat = Arc::new(EchoChat::default());
        let engine = RagEngine::new(ContextBuilder::new(index, embedder), chat.clone());
        Fixture { engine, chat }
    }

    #[tokio::test]
    async fn test_answers_only_from_own_session() {
        let f = fixture(&[
            ("alpha", "v1", "Volcanoes erupt when magma pressure builds beneath the crust."),
            ("beta", "v2", "Sourdough bread needs a starter and a long fermentation."),
        ])
        .await;

        let alpha = f.engine.answer("alpha", "How does sourdough bread ferment?").await.unwrap();
        assert!(alpha.contains("Volcanoes erupt"));
        assert!(!alpha.contains("Sourdough"));

        let beta = f.engine.answer("beta", "Why do volcanoes erupt?").await.unwrap();
        assert!(beta.contains("Sourdough bread"));
        assert!(!beta.contains("Volcanoes"));
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_question() {
        let f = fixture(&[("s1", "v1", "The borrow checker enforces aliasing rules.")]).await;

        let response = f.engine.ask("s1", "What does the borrow checker do?").await.unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].source, "https://www.youtube.com/watch?v=v1");

        let calls = f.chat.calls.lock().unwrap();
        let (system, user) = &calls[0];
        assert!(system.ends_with("The borrow checker enforces aliasing rules."));
        assert!(!system.contains("{{context}}"));
        assert_eq!(user, "What does the borrow checker do?");
    }

    #[tokio::test]
    async fn test_empty_session_returns_fallback() {
        let f = fixture(&[("other", "v1", "Some unrelated content.")]).await;

        let answer = f.engine.answer("fresh", "Anything?").await.unwrap();
        assert_eq!(answer, Prompts::default().rag.fallback);
        assert!(f.chat.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_fallback() {
        let f = fixture(&[]).await;
        let mut prompts = Prompts::default();
        prompts.rag.fallback = "Nothing here yet.".to_string();
        let engine = f.engine.with_prompts(prompts);

        assert_eq!(engine.answer("s1", "hi").await.unwrap(), "Nothing here yet.");
    }

    #[tokio::test]
    async fn test_rejects_blank_input() {
        let f = fixture(&[]).await;
        assert_err!(f.engine.answer("", "question").await);
        assert_err!(f.engine.answer("s1", "  ").await);
    }

    #[test]
    fn test_format_for_display() {
        let response = RagResponse {
            answer: "Because.".to_string(),
            sources: vec![ContextChunk {
                video_id: "v1".to_string(),
                source: "https://www.youtube.com/watch?v=v1".to_string(),
                text: "excerpt".to_string(),
                score: 0.91,
            }],
        };
        assert_eq!(
            response.format_for_display(),
            "Because.\n\n--- Sources ---\nhttps://www.youtube.com/watch?v=v1 (score: 0.91)"
        );
    }
}
