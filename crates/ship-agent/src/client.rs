//! Gemini `generateContent` client
//!
//! Each call is a single stateless prompt. Rate limits (429) and server
//! errors (5xx) are retried with exponential backoff; everything else fails
//! the call with `ShipError::Generation`.

use async_trait::async_trait;
use ship_core::{GeneratorConfig, Result, Secret, ShipError};
use std::time::Duration;

use crate::auth;
use crate::generator::TextModel;
use crate::types::{GenerateRequest, GenerateResponse};

const MAX_BACKOFF_SECS: u64 = 60;

/// Client for the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Secret,
    max_retries: u32,
    initial_backoff_secs: u64,
}

impl GeminiClient {
    /// Create a client from configuration, resolving the API key
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let api_key = auth::resolve_api_key(config)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShipError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            initial_backoff_secs: config.initial_backoff_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest::from_prompt(prompt);
        let url = self.endpoint();

        let mut retries = 0;
        let mut backoff_secs = self.initial_backoff_secs;

        loop {
            tracing::debug!(
                "Sending request to {} (attempt {}, {} prompt chars)",
                self.model,
                retries + 1,
                prompt.len()
            );

            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", self.api_key.expose())
                .json(&request)
                .send()
                .await
                .map_err(|e| ShipError::Generation(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                retries += 1;
                if retries > self.max_retries {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    return Err(ShipError::Generation(format!(
                        "{} after {} retries: {}",
                        status, self.max_retries, error_text
                    )));
                }

                // Parse retry-after header if present, otherwise use exponential backoff
                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs);

                tracing::warn!(
                    "Generative service returned {}. Waiting {} seconds before retry {}/{}",
                    status,
                    wait_secs,
                    retries,
                    self.max_retries
                );

                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());
                return Err(ShipError::Generation(format!(
                    "Generative service error {}: {}",
                    status, error_text
                )));
            }

            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|e| ShipError::Generation(format!("Failed to parse response: {}", e)))?;

            let output = body
                .text()
                .ok_or_else(|| ShipError::Generation("No content in response".to_string()))?;

            match &body.usage_metadata {
                Some(usage) => tracing::info!(
                    "Generation complete ({} chars, {} prompt tokens, {} output tokens)",
                    output.len(),
                    usage.prompt_token_count,
                    usage.candidates_token_count
                ),
                None => tracing::info!("Generation complete ({} chars)", output.len()),
            }

            return Ok(output);
        }
    }
}
