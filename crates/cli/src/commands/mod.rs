pub mod agent;
pub mod extract;
pub mod gateway;
pub mod onboard;

use ragway_config::AppConfig;
use ragway_core::provider::Provider;
use ragway_providers::openai_compat::OpenAiCompatProvider;
use std::sync::Arc;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build the completion provider, with setup hints when no key is set.
pub(crate) fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set the environment variable:");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(Arc::new(OpenAiCompatProvider::from_config(config)?))
}
