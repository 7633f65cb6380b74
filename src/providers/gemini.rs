//! Hosted Gemini API provider.
//!
//! Talks to the Generative Language REST API via reqwest. Transient
//! failures (rate limits, service unavailability, timeouts) are retried
//! with bounded exponential backoff; auth and input errors surface
//! immediately with remediation guidance.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::constants::ENV_GEMINI_API_KEY;
use crate::env::Env;

use super::{retry_backoff, CallOptions, LlmProvider, ProviderError};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Maximum attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Hardcoded model list used when live enumeration fails.
const FALLBACK_MODELS: &[&str] = &[
    "gemini-2.0-flash-exp",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-pro",
];

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Google Gemini API provider (key-based auth).
pub struct GeminiProvider {
    client: reqwest::Client,
    env: Env,
    base_url: String,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self::with_env(Env::real())
    }

    pub fn with_env(env: Env) -> Self {
        Self {
            client: reqwest::Client::new(),
            env,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the provider at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<String, ProviderError> {
        self.env.var(ENV_GEMINI_API_KEY).map_err(|_| {
            ProviderError::NotInstalled(format!(
                "{ENV_GEMINI_API_KEY} is not set — export an API key to use the gemini provider"
            ))
        })
    }

    /// One generateContent attempt, with HTTP status mapped onto the
    /// provider failure taxonomy.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        opts: &CallOptions,
    ) -> Result<String, ProviderError> {
        let key = self.api_key()?;
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .timeout(opts.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Transient(format!("request timed out: {e}"))
                } else {
                    ProviderError::Transient(format!("connection error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &detail));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Failed(format!("malformed API response: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::Failed(
                "API returned no candidate text".to_string(),
            ));
        }
        Ok(text)
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an HTTP status onto the provider failure taxonomy.
fn classify_status(status: u16, detail: &str) -> ProviderError {
    let detail = detail.chars().take(300).collect::<String>();
    match status {
        400 => ProviderError::InvalidInput(format!("API rejected the prompt (400): {detail}")),
        401 | 403 => ProviderError::Auth(format!(
            "API key rejected ({status}) — check {ENV_GEMINI_API_KEY}: {detail}"
        )),
        429 | 500 | 502 | 503 | 529 => {
            ProviderError::Transient(format!("API unavailable ({status}): {detail}"))
        }
        _ => ProviderError::Failed(format!("API error ({status}): {detail}")),
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn is_available(&self) -> bool {
        self.env.is_set(ENV_GEMINI_API_KEY)
    }

    async fn call(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty prompt".to_string()));
        }
        let model = opts.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let mut attempt = 0;
        loop {
            match self.generate(model, prompt, opts).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                    let backoff = retry_backoff(attempt);
                    warn!("gemini: {e}; retry in {}s", backoff.as_secs());
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    async fn list_models(&self) -> Vec<String> {
        let fallback = || FALLBACK_MODELS.iter().map(|m| m.to_string()).collect();

        let Ok(key) = self.api_key() else {
            return fallback();
        };
        let url = format!("{}/models", self.base_url);
        let result = self
            .client
            .get(&url)
            .header("x-goog-api-key", key)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<ModelsResponse>().await {
                    Ok(parsed) => {
                        let mut models: Vec<String> = parsed
                            .models
                            .into_iter()
                            .map(|m| m.name.trim_start_matches("models/").to_string())
                            .filter(|name| name.contains("gemini"))
                            .collect();
                        models.sort();
                        if models.is_empty() {
                            fallback()
                        } else {
                            models
                        }
                    }
                    Err(e) => {
                        debug!("gemini: model list parse failed: {e}");
                        fallback()
                    }
                }
            }
            Ok(response) => {
                debug!("gemini: model list returned {}", response.status());
                fallback()
            }
            Err(e) => {
                debug!("gemini: model list request failed: {e}");
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(400, ""),
            ProviderError::InvalidInput(_)
        ));
        assert!(matches!(classify_status(401, ""), ProviderError::Auth(_)));
        assert!(matches!(classify_status(403, ""), ProviderError::Auth(_)));
        assert!(classify_status(429, "").is_retryable());
        assert!(classify_status(503, "").is_retryable());
        assert!(classify_status(529, "").is_retryable());
        assert!(!classify_status(418, "").is_retryable());
    }

    #[tokio::test]
    async fn unavailable_without_api_key() {
        let provider = GeminiProvider::with_env(Env::mock(Vec::<(&str, &str)>::new()));
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn available_with_api_key() {
        let provider = GeminiProvider::with_env(Env::mock([(ENV_GEMINI_API_KEY, "key")]));
        assert!(provider.is_available().await);
    }

    #[tokio::test]
    async fn empty_prompt_is_invalid_input() {
        let provider = GeminiProvider::with_env(Env::mock([(ENV_GEMINI_API_KEY, "key")]));
        let err = provider
            .call("   ", &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_key_reported_as_not_installed() {
        let provider = GeminiProvider::with_env(Env::mock(Vec::<(&str, &str)>::new()));
        let err = provider
            .call("prompt", &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotInstalled(_)));
        assert!(err.to_string().contains(ENV_GEMINI_API_KEY));
    }

    #[tokio::test]
    async fn list_models_falls_back_without_key() {
        let provider = GeminiProvider::with_env(Env::mock(Vec::<(&str, &str)>::new()));
        let models = provider.list_models().await;
        assert!(models.contains(&DEFAULT_MODEL.to_string()));
    }
}
