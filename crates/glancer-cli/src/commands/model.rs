//! Model management commands.

use glancer_gateway::AppConfig;
use glancer_supervisor::{ModelName, OllamaClient, PullProgress};
use indicatif::{ProgressBar, ProgressStyle};

/// List models cached on the server.
pub(crate) async fn list(config: &AppConfig) -> miette::Result<()> {
    let client = OllamaClient::with_url(config.ollama_url.as_str());
    let models = client
        .list_models()
        .await
        .map_err(|e| miette::miette!("Failed to list models: {}", e))?;

    if models.is_empty() {
        println!("No models installed.");
        println!();
        println!("To install the configured model, run:");
        println!("  glancer model pull");
        return Ok(());
    }

    println!("Installed models:");
    for model in models {
        let marker = if config.model.matches(&model) {
            " (configured)"
        } else {
            ""
        };
        println!("  - {}{}", model, marker);
    }

    Ok(())
}

/// Pull a model, showing download progress.
pub(crate) async fn pull(config: &AppConfig, name: Option<&str>) -> miette::Result<()> {
    let model = name.map(ModelName::from).unwrap_or_else(|| config.model.clone());
    let client = OllamaClient::with_url(config.ollama_url.as_str());

    let installed = client
        .list_models()
        .await
        .map_err(|e| miette::miette!("Failed to list models: {}", e))?;
    if installed.iter().any(|listed| model.matches(listed)) {
        println!("Model '{}' is already installed.", model);
        return Ok(());
    }

    println!("Pulling model: {}", model);
    println!("This may take a while depending on your connection...");
    println!();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {msg:30} [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
        )
        .map_err(|e| miette::miette!("Invalid progress bar template: {}", e))?
        .progress_chars("#>-"),
    );

    let result = client
        .pull_with_progress(model.as_str(), |progress: &PullProgress| {
            if let (Some(total), Some(completed)) = (progress.total, progress.completed) {
                pb.set_length(total);
                pb.set_position(completed);
            }
            pb.set_message(progress.status.clone());
        })
        .await;

    match result {
        Ok(()) => {
            pb.finish_with_message("Download complete");
            println!();
            println!("Model '{}' pulled successfully!", model);
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Download failed");
            Err(miette::miette!("Failed to pull model '{}': {}", model, e))
        }
    }
}
