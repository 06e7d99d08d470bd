//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{Settings, VectorStoreProvider};
use crate::error::{Result, TubechatError};
use crate::vector_store::PINECONE_API_KEY_ENV;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion requires yt-dlp, the embedding key and the index.
    Ingest,
    /// Asking questions requires the API key and the index.
    Ask,
    /// Serving needs everything ingestion and asking need.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_api_key("OPENAI_API_KEY", "sk-...")?;
    if settings.vector_store.provider == VectorStoreProvider::Pinecone {
        check_api_key(PINECONE_API_KEY_ENV, "pcsk_...")?;
    }

    match operation {
        Operation::Ingest | Operation::Serve => check_tool(&settings.youtube.ytdlp_path)?,
        Operation::Ask => {}
    }
    Ok(())
}

/// Check that an API key environment variable is set.
fn check_api_key(var: &str, example: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(TubechatError::Config(format!(
            "{} is empty. Set it with: export {}='{}'",
            var, var, example
        ))),
        Err(_) => Err(TubechatError::Config(format!(
            "{} not set. Set it with: export {}='{}'",
            var, var, example
        ))),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(TubechatError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TubechatError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(TubechatError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let err = check_tool("tubechat-no-such-tool").unwrap_err();
        assert!(matches!(err, TubechatError::ToolNotFound(_)));
    }

    #[test]
    fn test_unset_key() {
        let err = check_api_key("TUBECHAT_TEST_UNSET_KEY", "x").unwrap_err();
        assert!(err.to_string().contains("TUBECHAT_TEST_UNSET_KEY not set"));
    }
}
