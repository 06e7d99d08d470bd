//! Configuration module for Tubechat.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, PromptSettings, RagSettings,
    ServerSettings, Settings, VectorStoreProvider, VectorStoreSettings, YoutubeSettings,
};
