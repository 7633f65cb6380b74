//! LLM provider abstraction and registry.
//!
//! A strategy-pattern seam over interchangeable backends with different
//! availability, auth, and tool-permission models: a hosted API (Gemini),
//! an interactive CLI tool (Copilot CLI), and a clipboard-manual mode.
//! New backends register by name without modifying dispatch logic.

pub mod clipboard;
pub mod copilot;
pub mod gemini;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::constants::PROVIDER_TIMEOUT_SECS;

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Binary or credential entirely absent. Not retryable — the user
    /// must install or configure something.
    #[error("provider not installed: {0}")]
    NotInstalled(String),

    /// Installed but not authenticated. Not retryable without user action.
    #[error("provider authentication failed: {0}")]
    Auth(String),

    /// Timeout, rate limit, or service unavailability. Retryable with
    /// backoff.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The prompt itself was rejected. Not retryable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other terminal failure.
    #[error("provider call failed: {0}")]
    Failed(String),

    #[error("unknown LLM provider: '{name}'. Available providers: {available}")]
    UnknownProvider { name: String, available: String },
}

impl ProviderError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Tool access granted to an agentic provider call.
///
/// Defaults to no tools at all: review and analysis workflows must never
/// hand the LLM write access to the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAccess {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    pub allow_all: bool,
}

impl ToolAccess {
    /// No tools whatsoever.
    pub fn none() -> Self {
        Self::default()
    }

    /// An explicit allow-list.
    pub fn allow(tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allow: tools.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Options for a single provider call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    /// Hard timeout for the call.
    pub timeout: Duration,
    pub tools: ToolAccess,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            model: None,
            timeout: Duration::from_secs(PROVIDER_TIMEOUT_SECS),
            tools: ToolAccess::none(),
        }
    }
}

/// Capability set every LLM backend implements.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry key for this provider.
    fn name(&self) -> &'static str;

    /// Cheap, side-effect-free check of credentials / binary presence.
    async fn is_available(&self) -> bool;

    /// Invoke the model. Blocks for the duration of the external call,
    /// bounded by `opts.timeout`.
    async fn call(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError>;

    /// Default model identifier for this backend.
    fn default_model(&self) -> &'static str;

    /// Best-effort model enumeration. Falls back to a hardcoded list when
    /// live listing fails — never errors.
    async fn list_models(&self) -> Vec<String>;
}

/// Registry of providers keyed by name.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// An empty registry (tests register their own providers).
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// The registry with all built-in backends.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(gemini::GeminiProvider::new()));
        registry.register(Box::new(copilot::CopilotCliProvider::new()));
        registry.register(Box::new(clipboard::ClipboardProvider::new()));
        registry
    }

    /// Register a provider under its own name. A later registration with
    /// the same name replaces the earlier one (test seam).
    pub fn register(&mut self, provider: Box<dyn LlmProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<&dyn LlmProvider, ProviderError> {
        self.providers
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| ProviderError::UnknownProvider {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.providers.keys().copied().collect();
        names.sort();
        names
    }

    /// Iterate providers in name order (backs the `providers` command).
    pub fn iter(&self) -> impl Iterator<Item = &dyn LlmProvider> {
        let mut entries: Vec<(&&'static str, &Box<dyn LlmProvider>)> =
            self.providers.iter().collect();
        entries.sort_by_key(|(name, _)| **name);
        entries.into_iter().map(|(_, p)| p.as_ref())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Compute the backoff duration for a retry attempt: 1s, 2s, 4s, ...
/// capped at 30s.
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = Duration::from_secs(1).saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_builtins() {
        let registry = ProviderRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["clipboard", "copilot-cli", "gemini"]);
        assert!(registry.get("gemini").is_ok());
    }

    #[test]
    fn unknown_provider_names_alternatives() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry.get("nonsense").err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("nonsense"));
        assert!(msg.contains("gemini"));
    }

    #[test]
    fn tool_access_defaults_to_none() {
        let opts = CallOptions::default();
        assert_eq!(opts.tools, ToolAccess::none());
        assert!(opts.tools.allow.is_empty());
        assert!(!opts.tools.allow_all);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(0), Duration::from_secs(1));
        assert_eq!(retry_backoff(1), Duration::from_secs(2));
        assert_eq!(retry_backoff(2), Duration::from_secs(4));
        assert_eq!(retry_backoff(10), Duration::from_secs(30));
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ProviderError::Transient("429".into()).is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::InvalidInput("empty".into()).is_retryable());
    }
}
