//! Glancer CLI - local chat gateway in front of an Ollama server.

use clap::{Parser, Subcommand};
use glancer_gateway::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::serve::ServeOptions;

/// Glancer - local HTTP gateway for LLM chat
#[derive(Parser)]
#[command(name = "glancer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start Ollama if needed and serve the chat gateway (default)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Model to chat with
        #[arg(short, long)]
        model: Option<String>,
        /// Exit if the model cannot be made available
        #[arg(long)]
        require_model: bool,
        /// Do not probe, launch or pull; assume Ollama is managed elsewhere
        #[arg(long)]
        no_supervise: bool,
    },

    /// Show configuration, executable search paths and server state
    Status,

    /// Manage models on the Ollama server
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
}

#[derive(Subcommand)]
enum ModelCommand {
    /// List models cached on the server
    List,
    /// Pull a model (default: the configured model)
    Pull {
        /// Model name, e.g. gemma3:270m
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    AppConfig::load_dotenv();
    let config = AppConfig::from_env();

    match cli.command {
        None => commands::serve::run(config, ServeOptions::default()).await,
        Some(Commands::Serve {
            host,
            port,
            model,
            require_model,
            no_supervise,
        }) => {
            let options = ServeOptions {
                host,
                port,
                model,
                require_model,
                no_supervise,
            };
            commands::serve::run(config, options).await
        }
        Some(Commands::Status) => commands::status::run(&config).await,
        Some(Commands::Model { command }) => match command {
            ModelCommand::List => commands::model::list(&config).await,
            ModelCommand::Pull { name } => commands::model::pull(&config, name.as_deref()).await,
        },
    }
}
