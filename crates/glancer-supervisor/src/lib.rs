//! # Glancer inference server supervisor
//!
//! Makes sure a local Ollama server is up and has the configured model
//! cached before the gateway starts answering chat requests.
//!
//! ## Startup sequence
//!
//! ```text
//! ┌─────────┐ reachable ┌──────────────┐
//! │  Probe  │ ────────> │ ensure_model │ ── list ── pull (if missing)
//! └─────────┘           └──────────────┘
//!      │ refused               ^
//!      v                       │
//! ┌─────────┐   ┌────────┐   ┌────────┐
//! │ Locator │ > │ Launch │ > │ Settle │
//! └─────────┘   └────────┘   └────────┘
//! ```
//!
//! The spawned server is owned by the [`Supervisor`] through a
//! [`ServerHandle`], which terminates the process when dropped.
//!
//! ## Usage
//!
//! ```ignore
//! use glancer_supervisor::{OllamaClient, Supervisor, SupervisorConfig};
//!
//! let mut supervisor = Supervisor::new(OllamaClient::new());
//! supervisor.ensure_server_ready(&SupervisorConfig::default()).await?;
//! // ... serve requests ...
//! supervisor.shutdown();
//! ```

mod api;
mod client;
mod error;
pub mod locator;
mod model;
mod process;
mod supervisor;

pub use api::InferenceApi;
pub use client::{
    ChatMessage, ClientError, OllamaClient, PullProgress, DEFAULT_OLLAMA_URL,
    DEFAULT_PROBE_TIMEOUT,
};
pub use error::{ModelError, ModelErrorKind, SupervisorError};
pub use locator::{DeploymentContext, ExecutableCandidate, ExecutableLocator};
pub use model::{ensure_model, ModelName, DEFAULT_MODEL};
pub use process::{launch, ServeSpawner, ServerHandle, Spawner};
pub use supervisor::{Supervisor, SupervisorConfig, DEFAULT_SETTLE_INTERVAL};
