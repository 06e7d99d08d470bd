//! Tubechat - chat with YouTube videos
//!
//! Turns a YouTube video, playlist or channel URL into searchable transcript
//! excerpts scoped to a session, and answers questions from those excerpts only.
//!
//! # Overview
//!
//! Tubechat allows you to:
//! - Resolve any YouTube URL shape into the videos it refers to
//! - Fetch each video's transcript, skipping videos that have none
//! - Chunk, embed and index transcripts under a session id
//! - Ask questions that are answered only from the session's own videos
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `youtube` - URL resolution, playlist expansion, transcript retrieval
//! - `scraper` - URL to transcript records, tolerant of per-video failures
//! - `chunking` - Overlapping, size-bounded text chunks
//! - `embedding` - Embedding generation
//! - `vector_store` - Session-filtered vector index abstraction (Pinecone, SQLite, memory)
//! - `ingest` - Chunk, embed and upsert transcripts
//! - `rag` - Retrieval and answer generation
//! - `session` - Session-to-video registry for display
//! - `pipeline` - Pipeline coordination
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use tubechat::config::Settings;
//! use tubechat::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load_from(None)?;
//!     let pipeline = Pipeline::from_settings(&settings).await?;
//!
//!     let outcome = pipeline
//!         .ingest_url("https://www.youtube.com/playlist?list=PL...", None)
//!         .await?;
//!     let answer = pipeline
//!         .answer(&outcome.session_id, "What are these videos about?")
//!         .await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod openai;
pub mod pipeline;
pub mod rag;
pub mod scraper;
pub mod session;
pub mod vector_store;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, TubechatError};
