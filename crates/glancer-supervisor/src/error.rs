//! Error types for supervisor operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::client::ClientError;
use crate::model::ModelName;

/// Errors that can occur while bringing the inference server up.
///
/// None of these are fatal to the gateway: the caller logs them and keeps
/// serving, since the server may still be started by hand later.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The probe failed for a reason other than a refused connection.
    #[error("Could not determine whether Ollama is running: {0}")]
    Probe(String),

    /// No candidate location holds an Ollama executable.
    #[error(
        "Ollama executable not found. Install Ollama or place the binary at one of: {}",
        display_paths(.searched)
    )]
    ExecutableNotFound {
        /// Every path that was checked, in search order.
        searched: Vec<PathBuf>,
    },

    /// Spawning the executable failed.
    #[error("Failed to launch {}: {}", .path.display(), .source)]
    Launch {
        /// Executable that could not be started.
        path: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The model could not be confirmed or pulled.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Which step of the model readiness check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Listing the locally cached models failed.
    ListFailed,
    /// Pulling the missing model failed.
    PullFailed,
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErrorKind::ListFailed => write!(f, "Failed to list local models while checking"),
            ModelErrorKind::PullFailed => write!(f, "Failed to pull model"),
        }
    }
}

/// Model readiness failure.
#[derive(Debug, Error)]
#[error("{kind} '{model}': {reason}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub model: String,
    pub reason: String,
}

impl ModelError {
    pub(crate) fn list_failed(model: &ModelName, err: ClientError) -> Self {
        Self {
            kind: ModelErrorKind::ListFailed,
            model: model.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn pull_failed(model: &ModelName, err: ClientError) -> Self {
        Self {
            kind: ModelErrorKind::PullFailed,
            model: model.to_string(),
            reason: err.to_string(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<no candidate locations>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_searched_paths() {
        let err = SupervisorError::ExecutableNotFound {
            searched: vec![PathBuf::from("/app/ollama"), PathBuf::from("/src/bin/ollama")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/app/ollama"));
        assert!(msg.contains("/src/bin/ollama"));
    }

    #[test]
    fn test_model_error_message() {
        let err = ModelError::pull_failed(
            &ModelName::new("llama3"),
            ClientError::Remote("pull model manifest: file does not exist".into()),
        );
        assert_eq!(err.kind, ModelErrorKind::PullFailed);
        assert!(err.to_string().starts_with("Failed to pull model 'llama3'"));
    }
}
