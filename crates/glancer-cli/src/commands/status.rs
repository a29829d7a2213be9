//! Status command - show configuration and inference server state.

use glancer_gateway::AppConfig;
use glancer_supervisor::OllamaClient;

pub(crate) async fn run(config: &AppConfig) -> miette::Result<()> {
    println!("Glancer Gateway");
    println!("===============");
    println!();
    println!("Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("Provider:         {}", config.provider);
    println!("Model:            {}", config.model);
    println!("Gateway address:  http://{}", config.bind_addr());
    println!("Ollama URL:       {}", config.ollama_url);
    println!();

    println!("Ollama executable search order:");
    for candidate in config.locator().candidates() {
        let marker = if candidate.is_usable() { "found" } else { "missing" };
        println!(
            "  {:<12} {} ({})",
            format!("{:?}", candidate.context),
            candidate.path.display(),
            marker
        );
    }
    if !config.allow_system_path {
        println!("  PATH search disabled (set GLANCER_ALLOW_SYSTEM_PATH=1 to enable)");
    }
    println!();

    let client = OllamaClient::with_url(config.ollama_url.as_str());
    match client.is_reachable().await {
        Ok(true) => {
            println!("Ollama server:    running");
            match client.list_models().await {
                Ok(models) => {
                    let installed = models.iter().any(|name| config.model.matches(name));
                    println!("  Model installed: {}", installed);
                }
                Err(e) => println!("  Could not list models: {}", e),
            }
        }
        Ok(false) => println!("Ollama server:    not running"),
        Err(e) => println!("Ollama server:    unknown ({})", e),
    }

    Ok(())
}
