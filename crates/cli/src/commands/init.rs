//! `recallchat init` — Write the default config file.

use recallchat_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config file already exists: {}", config_path.display());
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Wrote default config: {}", config_path.display());
    println!("\nNext steps:");
    println!("  ollama pull qwen2:0.5b && ollama pull all-minilm:33m");
    println!("  recallchat serve");

    Ok(())
}
