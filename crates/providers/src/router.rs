//! Provider construction from configuration.
//!
//! Every supported backend speaks the OpenAI-compatible API, so routing
//! reduces to picking the base URL and credentials for the configured name.

use recallchat_config::AppConfig;
use recallchat_core::error::ProviderError;
use std::sync::Arc;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<OpenAiCompatProvider>, ProviderError> {
    let name = config.provider.name.as_str();
    let base_url = config
        .provider
        .api_url
        .clone()
        .or_else(|| default_base_url(name).map(String::from))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{name}' has no default URL; set provider.api_url"
            ))
        })?;

    let api_key = config
        .provider
        .api_key
        .clone()
        .unwrap_or_else(|| if name == "ollama" { "ollama".into() } else { String::new() });

    info!(provider = %name, base_url = %base_url, "Provider configured");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "ollama" => Some("http://localhost:11434/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}
