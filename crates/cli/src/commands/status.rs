//! `recallchat status` — Show effective configuration and backend health.

use recallchat_config::AppConfig;
use recallchat_core::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("RecallChat Status");
    println!("=================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.provider.name);
    println!("  Model:        {}", config.generation.model);
    println!("  Embeddings:   {}", config.embedding.model);
    println!("  Threshold:    {}", config.memory.similarity_threshold);
    println!("  Recall pairs: {}", config.memory.max_turn_pairs);
    println!("  Top-k:        {}", config.retrieval.top_k);
    println!("  Passages:     {}", config.retrieval.documents.len());
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  CORS origin:  {}", config.gateway.allowed_origin);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults (run `recallchat init`)");
    }

    let provider = recallchat_providers::build_from_config(&config)?;
    match provider.health_check().await {
        Ok(true) => println!("  Backend reachable at {}", provider.base_url()),
        Ok(false) | Err(_) => println!("  Backend NOT reachable at {}", provider.base_url()),
    }

    Ok(())
}
