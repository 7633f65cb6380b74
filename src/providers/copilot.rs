//! GitHub Copilot CLI provider.
//!
//! Drives the `copilot` command in programmatic mode (`-p`). Tool access
//! is forwarded through `--allow-tool` / `--deny-tool` /
//! `--allow-all-tools`; the process is bounded by a hard timeout. CLI
//! failure modes are rarely transient, so errors propagate without
//! internal retry.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CallOptions, LlmProvider, ProviderError};

const DEFAULT_MODEL: &str = "claude-sonnet-4.5";

/// Models the Copilot CLI is known to serve. The CLI exposes no
/// programmatic listing, so this is the whole list.
const KNOWN_MODELS: &[&str] = &["claude-sonnet-4.5", "gpt-4", "o1-preview", "o1-mini"];

const INSTALL_HINT: &str =
    "install it from https://docs.github.com/en/copilot/how-tos/set-up/install-copilot-cli";

/// GitHub Copilot CLI provider (process-based).
pub struct CopilotCliProvider {
    binary: String,
}

impl CopilotCliProvider {
    pub fn new() -> Self {
        Self {
            binary: "copilot".to_string(),
        }
    }

    /// Use a different binary name (tests substitute a stub script).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Whether the binary answers `--version`.
    async fn is_installed(&self) -> bool {
        let probe = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match tokio::time::timeout(std::time::Duration::from_secs(5), probe).await {
            Ok(Ok(status)) => status.success(),
            _ => false,
        }
    }
}

impl Default for CopilotCliProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// The CLI sometimes reports auth failures on stderr with exit code 0.
fn is_auth_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no authentication information found")
        || lower.contains("authenticate")
        || lower.contains("unauthorized")
}

#[async_trait]
impl LlmProvider for CopilotCliProvider {
    fn name(&self) -> &'static str {
        "copilot-cli"
    }

    async fn is_available(&self) -> bool {
        self.is_installed().await
    }

    async fn call(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty prompt".to_string()));
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p").arg(prompt);

        if let Some(model) = &opts.model {
            cmd.arg("--model").arg(model);
        }

        if opts.tools.allow_all {
            cmd.arg("--allow-all-tools");
        } else {
            for tool in &opts.tools.allow {
                cmd.arg("--allow-tool").arg(tool);
            }
            for tool in &opts.tools.deny {
                cmd.arg("--deny-tool").arg(tool);
            }
        }

        let output = tokio::time::timeout(opts.timeout, cmd.output())
            .await
            .map_err(|_| {
                ProviderError::Transient(format!(
                    "copilot CLI timed out after {} seconds",
                    opts.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProviderError::NotInstalled(format!(
                        "copilot CLI not found in PATH — {INSTALL_HINT}"
                    ))
                } else {
                    ProviderError::Failed(format!("failed to run copilot CLI: {e}"))
                }
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_auth_failure(&stderr) {
            return Err(ProviderError::Auth(format!(
                "copilot CLI is not authenticated — run `copilot` once to sign in.\n{}",
                stderr.trim()
            )));
        }

        if !output.status.success() {
            return Err(ProviderError::Failed(format!(
                "copilot CLI failed (exit {}): {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    async fn list_models(&self) -> Vec<String> {
        KNOWN_MODELS.iter().map(|m| m.to_string()).collect()
    }
}
