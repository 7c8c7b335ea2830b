//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the chat-completion LLM.
//! It implements the `GenerativeModel` port from the `core` crate against any
//! OpenAI-compatible endpoint (OpenAI itself, or Gemini's compatibility layer).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use nexus_chat_core::ports::{GenerativeModel, PortError, PortResult};
use std::time::Duration;
use tracing::{error, instrument};

const SYSTEM_PROMPT: &str = "You are Nexus, a friendly and knowledgeable assistant.";

/// Builds a client for an OpenAI-compatible API.
///
/// Every request is bounded by `timeout` and failures are never retried.
pub fn openai_client(
    api_key: &str,
    api_base: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>, PortError> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base.trim_end_matches('/'));
    }

    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {e}")))?;

    let no_retries = backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retries))
}

/// Maps client failures onto the port taxonomy: anything that happened on the
/// wire (timeouts, refused connections, provider errors) is `Unavailable`.
pub(crate) fn map_openai_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::InvalidArgument(msg) => PortError::Unexpected(msg),
        other => PortError::Unavailable(other.to_string()),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerativeModel` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `GenerativeModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerativeModel for OpenAiChatAdapter {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            error!("Chat completion request failed: {e}");
            map_openai_error(e)
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unavailable("the model returned no text content".to_string())
            })
    }
}
