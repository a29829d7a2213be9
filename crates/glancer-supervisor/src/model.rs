//! Model readiness: make sure the configured model is cached on the server.

use std::fmt;

use tracing::info;

use crate::api::InferenceApi;
use crate::error::ModelError;

/// Default model served by the gateway.
pub const DEFAULT_MODEL: &str = "gemma3:270m";

/// Name of a model artifact, e.g. `gemma3:270m`.
///
/// Ollama stores untagged names under the `latest` tag, so `llama3` and
/// `llama3:latest` refer to the same model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelName(String);

impl ModelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `listed`, as returned by the server's model list, names this
    /// model.
    pub fn matches(&self, listed: &str) -> bool {
        with_tag(&self.0) == with_tag(listed)
    }
}

impl Default for ModelName {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModelName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Append `:latest` when the name carries no tag. A colon before the last
/// `/` belongs to a registry host, not a tag.
fn with_tag(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    if base.contains(':') {
        name.to_string()
    } else {
        format!("{}:latest", name)
    }
}

/// Pull `model` unless the server already has it.
///
/// Returns immediately when the model is listed. Otherwise blocks until the
/// pull completes; there is no timeout.
pub async fn ensure_model<A>(api: &A, model: &ModelName) -> Result<(), ModelError>
where
    A: InferenceApi + ?Sized,
{
    info!("Checking for model: {}", model);

    let local_models = api
        .list_models()
        .await
        .map_err(|e| ModelError::list_failed(model, e))?;

    if local_models.iter().any(|name| model.matches(name)) {
        info!("Model '{}' already exists locally", model);
        return Ok(());
    }

    info!(
        "Model '{}' not found. Pulling from the Ollama registry, this may take a while...",
        model
    );
    api.pull_model(model.as_str())
        .await
        .map_err(|e| ModelError::pull_failed(model, e))?;

    info!("Model '{}' pull complete", model);
    Ok(())
}
