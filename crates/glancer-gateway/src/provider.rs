//! Provider selection and chat forwarding.

use std::fmt;

use async_trait::async_trait;
use glancer_supervisor::{ChatMessage, ClientError, ModelName, OllamaClient};
use serde_json::Value;

use crate::error::GatewayError;

/// LLM provider selected by `LLM_PROVIDER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
    Gemini,
    /// Anything else; rejected per request.
    Other(String),
}

impl Provider {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "ollama" => Provider::Ollama,
            "openai" => Provider::OpenAi,
            "gemini" => Provider::Gemini,
            _ => Provider::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Other(name) => name,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can answer a chat request for a model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<Value, ClientError>;
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<Value, ClientError> {
        OllamaClient::chat(self, model, messages).await
    }
}

/// Route `prompt` to `provider` and return its response untouched.
pub async fn handle_chat_request(
    provider: &Provider,
    backend: &dyn ChatBackend,
    model: &ModelName,
    prompt: &str,
) -> Result<Value, GatewayError> {
    match provider {
        Provider::Ollama => {
            let messages = [ChatMessage::user(prompt)];
            Ok(backend.chat(model.as_str(), &messages).await?)
        }
        // TODO: forward to the OpenAI chat completions API once an API key setting exists.
        Provider::OpenAi => Err(GatewayError::NotImplemented("OpenAI")),
        Provider::Gemini => Err(GatewayError::NotImplemented("Gemini")),
        Provider::Other(name) => Err(GatewayError::UnsupportedProvider(name.clone())),
    }
}
