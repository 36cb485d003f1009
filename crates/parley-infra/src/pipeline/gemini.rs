//! Gemini answer pipeline over the OpenAI-compatible beta endpoint.
//!
//! Uses [`async_openai`] for type-safe request/response handling. The
//! base URL is configurable, so any OpenAI-compatible backend works; the
//! default points at Google Gemini.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use secrecy::ExposeSecret;

use parley_core::pipeline::AnswerPipeline;
use parley_types::config::PipelineConfig;
use parley_types::error::PipelineError;

/// System prompt framing answers for the chat UI.
const SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's question concisely.";

/// Answer pipeline backed by an OpenAI-compatible chat completion API.
///
/// # API Key Security
///
/// Does NOT derive Debug to prevent accidental exposure of the API key
/// stored inside the `async_openai::Client`.
pub struct GeminiPipeline {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiPipeline {
    /// Build a pipeline from configuration without touching the network.
    pub fn new(config: &PipelineConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.expose_secret())
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
        }
    }

    /// Build a pipeline and probe the backend once with a one-token
    /// completion, so bad credentials or endpoints surface at boot
    /// instead of on the first user exchange.
    pub async fn connect(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let pipeline = Self::new(config);
        let probe = CreateChatCompletionRequest {
            model: pipeline.model.clone(),
            messages: vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text("ping".to_string()),
                    name: None,
                },
            )],
            max_completion_tokens: Some(1),
            ..Default::default()
        };
        pipeline
            .client
            .chat()
            .create(probe)
            .await
            .map_err(map_openai_error)?;
        Ok(pipeline)
    }
}

impl AnswerPipeline for GeminiPipeline {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn answer(&self, query: &str) -> Result<String, PipelineError> {
        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(
                        SYSTEM_PROMPT.to_string(),
                    ),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(query.to_string()),
                    name: None,
                }),
            ],
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(PipelineError::EmptyCompletion);
        }
        Ok(content)
    }
}

fn map_openai_error(err: async_openai::error::OpenAIError) -> PipelineError {
    use async_openai::error::OpenAIError;

    match err {
        OpenAIError::ApiError(api) => PipelineError::Backend(api.message),
        other => PipelineError::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn pipeline_builds_from_config() {
        let config = PipelineConfig::with_key(SecretString::from("test-key"));
        let pipeline = GeminiPipeline::new(&config);
        assert_eq!(pipeline.name(), "gemini");
        assert_eq!(pipeline.model, "gemini-2.5-flash");
    }
}
