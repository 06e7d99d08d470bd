//! Configuration settings for Tubechat.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub youtube: YoutubeSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub rag: RagSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tubechat".to_string(),
        }
    }
}

/// YouTube scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// yt-dlp executable name or path.
    pub ytdlp_path: String,
    /// Preferred caption languages, in order.
    pub languages: Vec<String>,
    /// Maximum concurrent transcript fetches (1 = sequential).
    pub max_concurrent_fetches: usize,
    /// Extra attempts for transient transcript failures.
    pub fetch_retries: u32,
    /// Base backoff between retries in milliseconds (doubles per attempt).
    pub retry_backoff_ms: u64,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            languages: vec!["en".to_string()],
            max_concurrent_fetches: 1,
            fetch_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Transcript chunking settings (characters).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length.
    pub max_len: usize,
    /// Overlap between adjacent chunks.
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_len: 1000,
            overlap: 200,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. The vector index is created with this dimension.
    pub dimensions: u32,
    /// OpenAI-compatible base URL (None = api.openai.com).
    pub api_base: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 768,
            api_base: None,
        }
    }
}

/// Vector index backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Managed Pinecone serverless index.
    #[default]
    Pinecone,
    /// Local SQLite file.
    Sqlite,
    /// Process-local, lost on exit.
    Memory,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(VectorStoreProvider::Pinecone),
            "sqlite" => Ok(VectorStoreProvider::Sqlite),
            "memory" => Ok(VectorStoreProvider::Memory),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Pinecone => write!(f, "pinecone"),
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
            VectorStoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Backend provider.
    pub provider: VectorStoreProvider,
    /// Index name (Pinecone).
    pub index_name: String,
    /// Serverless cloud for index creation (Pinecone).
    pub cloud: String,
    /// Serverless region for index creation (Pinecone).
    pub region: String,
    /// Vectors per upsert request.
    pub upsert_batch_size: usize,
    /// Number of matches retrieved per question.
    pub top_k: usize,
    /// Path to SQLite database (sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Pinecone,
            index_name: "yt-rag-chat".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            upsert_batch_size: 100,
            top_k: 5,
            sqlite_path: "~/.tubechat/vectors.db".to_string(),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Chat model for answer synthesis.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// OpenAI-compatible base URL (None = api.openai.com).
    pub api_base: Option<String>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            api_base: None,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TubechatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubechat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.max_len, 1000);
        assert_eq!(settings.chunking.overlap, 200);
        assert_eq!(settings.embedding.dimensions, 768);
        assert_eq!(settings.vector_store.upsert_batch_size, 100);
        assert_eq!(settings.vector_store.top_k, 5);
        assert_eq!(settings.rag.temperature, 0.0);
        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Pinecone);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [vector_store]
            provider = "sqlite"

            [chunking]
            max_len = 500
            "#,
        )
        .unwrap();

        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Sqlite);
        assert_eq!(settings.vector_store.index_name, "yt-rag-chat");
        assert_eq!(settings.chunking.max_len, 500);
        assert_eq!(settings.chunking.overlap, 200);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.server.port = 9100;
        settings.youtube.languages = vec!["de".to_string(), "en".to_string()];
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 9100);
        assert_eq!(loaded.youtube.languages, vec!["de", "en"]);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Memory".parse::<VectorStoreProvider>(), Ok(VectorStoreProvider::Memory));
        assert!("qdrant".parse::<VectorStoreProvider>().is_err());
    }
}
