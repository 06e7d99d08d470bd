//! OpenAI-compatible client construction.
//!
//! Both the embedder and the chat model talk to an OpenAI-compatible API. The
//! base URL is configurable so that other providers exposing the same surface
//! (for example Gemini's OpenAI endpoint) can be used without code changes.

use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (2 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create a client for the given base URL (or the OpenAI default).
pub fn create_client(api_base: Option<&str>) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client with a custom timeout.
pub fn create_client_with_timeout(
    api_base: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
        config = config.with_api_base(base.trim_end_matches('/'));
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
