//! The slice of the inference server API the supervisor depends on.

use async_trait::async_trait;

use crate::client::ClientError;

/// Operations the supervisor needs from the inference server.
///
/// [`OllamaClient`](crate::OllamaClient) is the production implementation;
/// tests substitute in-memory fakes.
#[async_trait]
pub trait InferenceApi: Send + Sync {
    /// `Ok(false)` only when the connection was refused. Any other transport
    /// failure is an error.
    async fn is_reachable(&self) -> Result<bool, ClientError>;

    /// Names of the models cached on the server.
    async fn list_models(&self) -> Result<Vec<String>, ClientError>;

    /// Download `name` and return once the server reports completion.
    async fn pull_model(&self, name: &str) -> Result<(), ClientError>;
}
