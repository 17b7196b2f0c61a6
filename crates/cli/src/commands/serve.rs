//! `recallchat serve` — Start the HTTP API server.

use recallchat_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("RecallChat Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Allowed origin: {}", config.gateway.allowed_origin);
    println!("   Similarity threshold: {}", config.memory.similarity_threshold);

    recallchat_gateway::start(config).await?;

    Ok(())
}
