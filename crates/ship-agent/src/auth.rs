//! API key resolution for the generative service

use ship_core::{GeneratorConfig, Result, Secret, ShipError};
use std::env;

/// Get the API key for the generative service
///
/// Priority:
/// 1. Key already loaded into the configuration
/// 2. The environment variable named by `api_key_env`
pub fn resolve_api_key(config: &GeneratorConfig) -> Result<Secret> {
    if let Some(key) = &config.api_key {
        return Ok(key.clone());
    }

    if let Ok(key) = env::var(&config.api_key_env) {
        if !key.is_empty() {
            tracing::info!("Using {}", config.api_key_env);
            return Ok(Secret::new(key));
        }
    }

    Err(ShipError::Config(format!(
        "No API key found for the generative service. Set {}.",
        config.api_key_env
    )))
}
