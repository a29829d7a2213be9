//! Serve command - bring Ollama up, then run the gateway.

use std::sync::Arc;

use glancer_gateway::{shutdown_signal, AppConfig, AppConfigBuilder, AppState, Provider};
use glancer_supervisor::{InferenceApi, OllamaClient, Spawner, Supervisor, SupervisorError};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Command-line overrides for `serve`.
#[derive(Debug, Default)]
pub(crate) struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model: Option<String>,
    pub require_model: bool,
    pub no_supervise: bool,
}

impl ServeOptions {
    fn apply(&self, config: AppConfig) -> AppConfig {
        let mut builder = AppConfigBuilder::from_config(config);
        if let Some(host) = &self.host {
            builder = builder.host(host.as_str());
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model.as_str());
        }
        if self.require_model {
            builder = builder.require_model(true);
        }
        builder.build()
    }
}

/// Result of bringing the inference server up before serving.
#[derive(Debug)]
pub(crate) enum Readiness {
    /// Server reachable and model cached.
    Ready,
    /// Supervision not applicable or disabled.
    Skipped,
    /// Serving anyway; chat requests fail until the problem is fixed.
    Degraded(SupervisorError),
}

pub(crate) async fn run(config: AppConfig, options: ServeOptions) -> miette::Result<()> {
    let config = options.apply(config);
    let client = OllamaClient::with_url(config.ollama_url.as_str());
    let mut supervisor = Supervisor::new(client.clone());

    let readiness = prepare(&mut supervisor, &config, !options.no_supervise).await?;
    if let Readiness::Degraded(e) = &readiness {
        report_degraded(e);
    }

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind {}: {}", addr, e))?;

    let state = Arc::new(AppState {
        provider: config.provider.clone(),
        model: config.model.clone(),
        backend: Arc::new(client),
    });

    let served = glancer_gateway::run(listener, state, shutdown_signal()).await;

    stop(supervisor).await;
    served.map_err(|e| miette::miette!("Gateway error: {}", e))
}

/// Run supervision for `config` and decide whether the gateway may start.
///
/// Fails only when `require_model` is set and the server or model could not
/// be made ready.
pub(crate) async fn prepare<A, S>(
    supervisor: &mut Supervisor<A, S>,
    config: &AppConfig,
    supervise: bool,
) -> miette::Result<Readiness>
where
    A: InferenceApi,
    S: Spawner,
{
    if config.provider != Provider::Ollama {
        info!(
            "Provider is '{}'; not managing a local Ollama server",
            config.provider
        );
        return Ok(Readiness::Skipped);
    }
    if !supervise {
        info!("Supervision disabled; expecting Ollama at {}", config.ollama_url);
        return Ok(Readiness::Skipped);
    }

    match supervisor.ensure_server_ready(&config.supervisor_config()).await {
        Ok(()) => {
            info!("Ollama is ready with model '{}'", config.model);
            Ok(Readiness::Ready)
        }
        Err(e) if config.require_model => {
            Err(miette::miette!("Inference server is not ready: {}", e))
        }
        Err(e) => Ok(Readiness::Degraded(e)),
    }
}

/// Stop the supervised server on the blocking pool; termination polls the
/// child for up to the grace period.
pub(crate) async fn stop<A, S>(mut supervisor: Supervisor<A, S>)
where
    A: Send + 'static,
    S: Send + 'static,
{
    if let Err(e) = tokio::task::spawn_blocking(move || supervisor.shutdown()).await {
        warn!("Failed to stop Ollama server: {}", e);
    }
}

fn report_degraded(err: &SupervisorError) {
    warn!("{}", err);
    match err {
        SupervisorError::ExecutableNotFound { .. } | SupervisorError::Launch { .. } => warn!(
            "Gateway starting without a local Ollama server; start one with `ollama serve` and requests will go through"
        ),
        SupervisorError::Probe(_) => warn!("Check OLLAMA_URL; gateway starting anyway"),
        SupervisorError::Model(_) => warn!(
            "Gateway starting without the model; chat requests fail until it is pulled (`glancer model pull`)"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use glancer_supervisor::ClientError;
    use std::path::Path;
    use std::process::Child;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Nothing listening, no models.
    struct StoppedServer;

    #[async_trait]
    impl InferenceApi for StoppedServer {
        async fn is_reachable(&self) -> Result<bool, ClientError> {
            Ok(false)
        }

        async fn list_models(&self) -> Result<Vec<String>, ClientError> {
            Err(ClientError::Unreachable("http://127.0.0.1:11434".into()))
        }

        async fn pull_model(&self, _name: &str) -> Result<(), ClientError> {
            Err(ClientError::Unreachable("http://127.0.0.1:11434".into()))
        }
    }

    #[derive(Default, Clone)]
    struct CountingSpawner {
        spawns: Arc<AtomicUsize>,
    }

    impl Spawner for CountingSpawner {
        fn spawn(&self, _executable: &Path) -> std::io::Result<Child> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::new(std::io::ErrorKind::Other, "not in tests"))
        }
    }

    fn config_without_executable(dir: &Path) -> AppConfig {
        AppConfig::builder()
            .install_dir(dir)
            .settle_interval(std::time::Duration::ZERO)
            .build()
    }

    #[tokio::test]
    async fn test_missing_executable_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_without_executable(dir.path());
        let spawner = CountingSpawner::default();
        let mut supervisor = Supervisor::with_spawner(StoppedServer, spawner.clone());

        let readiness = prepare(&mut supervisor, &config, true).await.unwrap();
        assert!(matches!(
            readiness,
            Readiness::Degraded(SupervisorError::ExecutableNotFound { .. })
        ));
        assert_eq!(spawner.spawns.load(Ordering::SeqCst), 0);
        assert!(supervisor.handle().is_none());
    }

    #[tokio::test]
    async fn test_require_model_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfigBuilder::from_config(config_without_executable(dir.path()))
            .require_model(true)
            .build();
        let mut supervisor = Supervisor::with_spawner(StoppedServer, CountingSpawner::default());

        let err = prepare(&mut supervisor, &config, true).await.unwrap_err();
        assert!(err.to_string().contains("not ready"));
    }

    #[tokio::test]
    async fn test_other_provider_skips_supervision() {
        let config = AppConfig::builder().provider(Provider::OpenAi).build();
        let mut supervisor = Supervisor::with_spawner(StoppedServer, CountingSpawner::default());

        let readiness = prepare(&mut supervisor, &config, true).await.unwrap();
        assert!(matches!(readiness, Readiness::Skipped));
    }

    #[tokio::test]
    async fn test_no_supervise_skips_supervision() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfigBuilder::from_config(config_without_executable(dir.path()))
            .require_model(true)
            .build();
        let mut supervisor = Supervisor::with_spawner(StoppedServer, CountingSpawner::default());

        let readiness = prepare(&mut supervisor, &config, false).await.unwrap();
        assert!(matches!(readiness, Readiness::Skipped));
    }

    /// Ignores SIGTERM, so stopping it runs the whole grace period.
    #[cfg(unix)]
    struct StubbornSpawner;

    #[cfg(unix)]
    impl Spawner for StubbornSpawner {
        fn spawn(&self, _executable: &Path) -> std::io::Result<Child> {
            std::process::Command::new("sh")
                .args(["-c", "trap '' TERM; exec sleep 30"])
                .spawn()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_does_not_block_the_runtime() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let exe = bin.join(glancer_supervisor::locator::binary_name());
        std::fs::write(&exe, b"").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = config_without_executable(dir.path());
        let mut supervisor = Supervisor::with_spawner(StoppedServer, StubbornSpawner);
        supervisor
            .ensure_running(&config.supervisor_config())
            .await
            .unwrap();
        assert!(supervisor.handle().is_some());

        let ticker = tokio::spawn(async {
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });
        // Let the shell install its trap before it is signalled.
        tokio::time::sleep(Duration::from_millis(200)).await;

        stop(supervisor).await;
        assert!(ticker.is_finished());
    }

    #[test]
    fn test_options_override_config() {
        let options = ServeOptions {
            host: Some("0.0.0.0".into()),
            port: Some(7000),
            model: Some("llama3".into()),
            require_model: true,
            no_supervise: false,
        };
        let config = options.apply(AppConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:7000");
        assert_eq!(config.model.as_str(), "llama3");
        assert!(config.require_model);
    }

    #[test]
    fn test_empty_options_keep_config() {
        let base = AppConfig::builder().port(6000).model("qwen2.5:0.5b").build();
        let config = ServeOptions::default().apply(base);
        assert_eq!(config.port, 6000);
        assert_eq!(config.model.as_str(), "qwen2.5:0.5b");
        assert!(!config.require_model);
    }
}
