//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use glancer_supervisor::{
    locator, ExecutableLocator, ModelName, SupervisorConfig, DEFAULT_OLLAMA_URL,
    DEFAULT_SETTLE_INTERVAL,
};
use tracing::{debug, warn};

use crate::provider::Provider;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 5001;

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// LLM provider (default: ollama)
    pub provider: Provider,
    /// Model to chat with (default: gemma3:270m)
    pub model: ModelName,
    /// Ollama base URL
    pub ollama_url: String,
    /// Host the gateway binds to
    pub host: String,
    /// Port the gateway binds to
    pub port: u16,
    /// Wait after spawning Ollama
    pub settle_interval: Duration,
    /// Whether `PATH` is searched for the Ollama executable
    pub allow_system_path: bool,
    /// Root whose `bin/` holds a development copy of Ollama
    pub install_dir: PathBuf,
    /// Abort startup when the model cannot be made available
    pub require_model: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: ModelName::default(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            settle_interval: DEFAULT_SETTLE_INTERVAL,
            allow_system_path: false,
            install_dir: locator::default_install_dir(),
            require_model: false,
        }
    }
}

impl AppConfig {
    /// Load `.env` from the working directory, if present.
    pub fn load_dotenv() {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let provider = lookup("LLM_PROVIDER")
            .map(|v| Provider::parse(&v))
            .unwrap_or(defaults.provider);

        let model = lookup("MODEL_NAME")
            .or_else(|| lookup("OLLAMA_MODEL"))
            .map(ModelName::from)
            .unwrap_or(defaults.model);

        let ollama_url = lookup("OLLAMA_URL").unwrap_or(defaults.ollama_url);
        let host = lookup("GLANCER_HOST").unwrap_or(defaults.host);

        let port = lookup("GLANCER_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let settle_interval = lookup("GLANCER_SETTLE_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.settle_interval);

        let allow_system_path = lookup("GLANCER_ALLOW_SYSTEM_PATH")
            .map(|v| is_truthy(&v))
            .unwrap_or(defaults.allow_system_path);

        let install_dir = lookup("GLANCER_INSTALL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.install_dir);

        let require_model = lookup("GLANCER_REQUIRE_MODEL")
            .map(|v| is_truthy(&v))
            .unwrap_or(defaults.require_model);

        Self {
            provider,
            model,
            ollama_url,
            host,
            port,
            settle_interval,
            allow_system_path,
            install_dir,
            require_model,
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// `host:port` to bind the gateway to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Executable search for this configuration.
    pub fn locator(&self) -> ExecutableLocator {
        ExecutableLocator::for_current_exe(&self.install_dir)
            .allow_system_path(self.allow_system_path)
    }

    /// Settings handed to the supervisor.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            model: self.model.clone(),
            settle_interval: self.settle_interval,
            locator: self.locator(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

/// Builder for gateway configuration.
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Start from an existing configuration.
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn model(mut self, model: impl Into<ModelName>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_url = url.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn settle_interval(mut self, interval: Duration) -> Self {
        self.config.settle_interval = interval;
        self
    }

    pub fn allow_system_path(mut self, allow: bool) -> Self {
        self.config.allow_system_path = allow;
        self
    }

    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.install_dir = dir.into();
        self
    }

    pub fn require_model(mut self, require: bool) -> Self {
        self.config.require_model = require;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
