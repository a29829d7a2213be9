//! Startup orchestration: probe, locate, launch, settle, ensure model.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::InferenceApi;
use crate::client::OllamaClient;
use crate::error::{ModelError, SupervisorError};
use crate::locator::ExecutableLocator;
use crate::model::{ensure_model, ModelName};
use crate::process::{launch, ServeSpawner, ServerHandle, Spawner};

/// Delay after spawning before the server's API is assumed usable.
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_secs(5);

/// What the supervisor needs to bring the server up.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Model that must be cached before serving.
    pub model: ModelName,
    /// Wait after a successful spawn.
    pub settle_interval: Duration,
    /// Where to look for the executable.
    pub locator: ExecutableLocator,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            model: ModelName::default(),
            settle_interval: DEFAULT_SETTLE_INTERVAL,
            locator: ExecutableLocator::default(),
        }
    }
}

/// Owner of the inference server process, if this gateway started one.
///
/// Dropping the supervisor drops its [`ServerHandle`], which terminates the
/// process.
pub struct Supervisor<A = OllamaClient, S = ServeSpawner> {
    api: A,
    spawner: S,
    handle: Option<ServerHandle>,
}

impl Supervisor {
    /// Supervisor that spawns the real `ollama serve`.
    pub fn new(api: OllamaClient) -> Self {
        Self::with_spawner(api, ServeSpawner)
    }
}

impl<A, S> Supervisor<A, S> {
    pub fn with_spawner(api: A, spawner: S) -> Self {
        Self {
            api,
            spawner,
            handle: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// The spawned server, if this supervisor launched one.
    pub fn handle(&self) -> Option<&ServerHandle> {
        self.handle.as_ref()
    }

    /// Terminate the spawned server, if any. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.terminate();
        }
    }
}

impl<A, S> Supervisor<A, S>
where
    A: InferenceApi,
    S: Spawner,
{
    /// Bring the server up if needed, then make sure the model is cached.
    pub async fn ensure_server_ready(
        &mut self,
        config: &SupervisorConfig,
    ) -> Result<(), SupervisorError> {
        self.ensure_running(config).await?;
        self.ensure_model(&config.model).await?;
        Ok(())
    }

    /// Launch the server unless something already answers on its address.
    pub async fn ensure_running(&mut self, config: &SupervisorConfig) -> Result<(), SupervisorError> {
        if self.is_reachable().await? {
            info!("Ollama server is already running");
            return Ok(());
        }

        if let Some(handle) = &self.handle {
            warn!(
                "Ollama server (PID: {}) was started by this gateway but is not answering; not launching another",
                handle.pid()
            );
            return Ok(());
        }

        let Some(executable) = config.locator.locate() else {
            let searched = config
                .locator
                .candidates()
                .into_iter()
                .map(|candidate| candidate.path)
                .collect();
            return Err(SupervisorError::ExecutableNotFound { searched });
        };

        info!(
            "Ollama server not found. Starting {} in the background...",
            executable.display()
        );
        let handle = launch(&self.spawner, &executable)?;
        info!("Ollama server started with PID: {}", handle.pid());
        self.handle = Some(handle);

        if !config.settle_interval.is_zero() {
            sleep(config.settle_interval).await;
        }

        match self.is_reachable().await {
            Ok(true) => info!("Ollama server is answering"),
            Ok(false) => warn!(
                "Ollama server still not answering after {:?}; continuing",
                config.settle_interval
            ),
            Err(e) => warn!("{}", e),
        }

        Ok(())
    }

    /// Probe the server's address.
    pub async fn is_reachable(&self) -> Result<bool, SupervisorError> {
        self.api
            .is_reachable()
            .await
            .map_err(|e| SupervisorError::Probe(e.to_string()))
    }

    /// Pull `model` unless the server already has it.
    pub async fn ensure_model(&self, model: &ModelName) -> Result<(), ModelError> {
        ensure_model(&self.api, model).await
    }
}
