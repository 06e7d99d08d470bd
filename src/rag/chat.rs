//! Chat completion capability.

use crate::config::RagSettings;
use crate::error::{Result, TubechatError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Trait for language models that answer a single user message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete `user` under the `system` instruction and return the reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Chat model backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    pub fn new(client: Client<OpenAIConfig>, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
        }
    }

    /// Create a chat model from settings.
    pub fn from_settings(settings: &RagSettings) -> Result<Self> {
        let client = create_client(settings.api_base.as_deref())?;
        Ok(Self::new(client, &settings.model, settings.temperature))
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, system, user), fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| TubechatError::Chat(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| TubechatError::Chat(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| TubechatError::Chat(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            TubechatError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TubechatError::Chat("Empty response from model".to_string()))?;

        debug!("Model replied with {} chars", answer.len());
        Ok(answer)
    }
}
