//! HTTP client for the Ollama API.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::InferenceApi;

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Timeout applied to the reachability probe only.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors from the Ollama client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not connect to Ollama at {0}")]
    Unreachable(String),
    #[error("Ollama API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Ollama error: {0}")]
    Remote(String),
    #[error("Pull of '{0}' ended before the server reported success")]
    PullIncomplete(String),
}

/// Ollama API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

/// Chat message in Ollama format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// A message with the `user` role.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request to the Ollama chat API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Request to the Ollama pull API.
#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// Response from Ollama tags API (list models).
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// One line of the pull NDJSON stream.
#[derive(Debug, Deserialize)]
struct PullEvent {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Progress update reported while a model is being pulled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullProgress {
    pub status: String,
    pub digest: Option<String>,
    pub total: Option<u64>,
    pub completed: Option<u64>,
}

impl PullProgress {
    /// Whether this is the final line of a successful pull.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

impl OllamaClient {
    /// Create a client for the default local URL.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_OLLAMA_URL)
    }

    /// Create a client with a custom base URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the timeout used by [`OllamaClient::is_reachable`].
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether anything answers HTTP at the base URL.
    ///
    /// The response status is ignored; only connectivity matters. Only a
    /// refused connection means "not running". Resolution failures, timeouts
    /// and other transport errors are returned as errors.
    pub async fn is_reachable(&self) -> Result<bool, ClientError> {
        let url = format!("{}/", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!("Ollama probe answered with {}", response.status());
                Ok(true)
            }
            Err(e) if is_connection_refused(&e) => {
                debug!("Ollama probe refused at {}", url);
                Ok(false)
            }
            Err(e) => Err(ClientError::Http(e)),
        }
    }

    /// List the models cached on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pull a model, calling `on_progress` for every status line.
    ///
    /// Blocks until the server reports `success`. No timeout is applied,
    /// downloads of large models can take a long time.
    pub async fn pull_with_progress<F>(&self, name: &str, mut on_progress: F) -> Result<(), ClientError>
    where
        F: FnMut(&PullProgress) + Send,
    {
        let url = format!("{}/api/pull", self.base_url);
        let request = PullRequest {
            model: name,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut succeeded = false;

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                succeeded |= handle_pull_line(&line, &mut on_progress)?;
            }
        }
        succeeded |= handle_pull_line(&buffer, &mut on_progress)?;

        if succeeded {
            Ok(())
        } else {
            Err(ClientError::PullIncomplete(name.to_string()))
        }
    }

    /// Send a non-streaming chat request and return the response verbatim.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<serde_json::Value, ClientError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    fn request_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_connect() {
            ClientError::Unreachable(self.base_url.clone())
        } else {
            ClientError::Http(e)
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceApi for OllamaClient {
    async fn is_reachable(&self) -> Result<bool, ClientError> {
        OllamaClient::is_reachable(self).await
    }

    async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        OllamaClient::list_models(self).await
    }

    async fn pull_model(&self, name: &str) -> Result<(), ClientError> {
        let mut last_status = String::new();
        self.pull_with_progress(name, |progress| {
            if progress.status != last_status {
                info!("Pulling '{}': {}", name, progress.status);
                last_status = progress.status.clone();
            } else if let (Some(total), Some(completed)) = (progress.total, progress.completed) {
                if total > 0 {
                    debug!("Pulling '{}': {}%", name, completed * 100 / total);
                }
            }
        })
        .await
    }
}

/// Returns `Ok(true)` when the line marks a successful end of the pull.
fn handle_pull_line<F>(line: &[u8], on_progress: &mut F) -> Result<bool, ClientError>
where
    F: FnMut(&PullProgress),
{
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }

    let event: PullEvent = serde_json::from_str(line)?;
    if let Some(error) = event.error {
        return Err(ClientError::Remote(error));
    }

    let progress = PullProgress {
        status: event.status.unwrap_or_default(),
        digest: event.digest,
        total: event.total,
        completed: event.completed,
    };
    on_progress(&progress);
    Ok(progress.is_success())
}

/// Whether the error chain bottoms out in a refused TCP connection.
fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    ClientError::Api { status, message }
}
