//! Language-model collaborator
//!
//! Text in, text out. The model is untrusted: it may fail, hang, or answer
//! with markdown around the payload. Callers wrap every call in
//! [`complete_within`] and fall back on error.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Language model request failed: {0}")]
    Api(#[from] OpenAIError),

    #[error("Language model unavailable: {0}")]
    Unavailable(String),

    #[error("Language model timed out after {0:?}")]
    Timeout(Duration),

    #[error("Language model returned no content")]
    EmptyResponse,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Model identifier for logs.
    fn name(&self) -> &str;
}

/// Connection settings for the remote model. Passed in explicitly; nothing
/// is read from the environment here.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Without a key the pipeline runs on fallbacks only.
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint; `None` uses api.openai.com.
    pub api_base: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModel {
    /// `None` when the config carries no API key.
    pub fn from_config(config: &ModelConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref().filter(|k| !k.trim().is_empty())?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.api_base {
            openai_config = openai_config.with_api_base(base);
        }

        Some(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?,
            )])
            .temperature(0.0)
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(ModelError::EmptyResponse)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// One model call bounded by `timeout`. Errors and timeouts both come back
/// as `Err`; nothing escapes this boundary.
pub async fn complete_within(
    model: &dyn LanguageModel,
    prompt: &str,
    timeout: Duration,
) -> Result<String, ModelError> {
    match tokio::time::timeout(timeout, model.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ModelError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl LanguageModel for Slow {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("SELECT 1".to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_no_key_means_no_remote_model() {
        assert!(OpenAiModel::from_config(&ModelConfig::default()).is_none());

        let blank = ModelConfig {
            api_key: Some("  ".to_string()),
            ..ModelConfig::default()
        };
        assert!(OpenAiModel::from_config(&blank).is_none());
    }

    #[test]
    fn test_key_builds_client() {
        let config = ModelConfig {
            api_key: Some("sk-test".to_string()),
            api_base: Some("http://localhost:11434/v1".to_string()),
            model: "llama3.2".to_string(),
            ..ModelConfig::default()
        };
        let model = OpenAiModel::from_config(&config).unwrap();
        assert_eq!(model.name(), "llama3.2");
    }

    #[tokio::test]
    async fn test_timeout_boundary() {
        let err = complete_within(&Slow, "prompt", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Timeout(_)));
    }
}
