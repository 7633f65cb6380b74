//! Clipboard-manual provider.
//!
//! Copies the rendered prompt to the system clipboard for the user to
//! paste into a chat UI by hand. There is no programmatic response:
//! `call` returns empty text, and the executor treats that as a terminal,
//! non-cacheable outcome.

use async_trait::async_trait;
use tracing::warn;

use super::{CallOptions, LlmProvider, ProviderError};

/// Manual provider backed by the system clipboard.
pub struct ClipboardProvider;

impl ClipboardProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClipboardProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for ClipboardProvider {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    async fn is_available(&self) -> bool {
        arboard::Clipboard::new().is_ok()
    }

    async fn call(&self, prompt: &str, _opts: &CallOptions) -> Result<String, ProviderError> {
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(prompt.to_string())) {
            Ok(()) => {
                eprintln!("Prompt copied to clipboard — paste it into your chat UI.");
            }
            Err(e) => {
                // Manual mode keeps going: the prompt artifact on disk is
                // still usable.
                warn!("failed to copy prompt to clipboard: {e}");
            }
        }
        Ok(String::new())
    }

    fn default_model(&self) -> &'static str {
        "manual"
    }

    async fn list_models(&self) -> Vec<String> {
        vec!["manual".to_string()]
    }
}
