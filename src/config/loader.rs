//! App config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags (applied by the caller)
//! 2. Environment variables
//! 3. `~/.config/redline/config.toml`
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::constants;
use crate::env::Env;

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub output: OutputConfig,
    pub render: RenderConfig,
    pub languages: LanguageConfig,
    /// Directory holding repository setup files. Defaults to
    /// `~/.config/redline/repos`.
    pub repos_dir: Option<PathBuf>,
    /// History database path. Defaults to the data directory.
    pub db_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            output: OutputConfig::default(),
            render: RenderConfig::default(),
            languages: LanguageConfig::default(),
            repos_dir: None,
            db_path: None,
        }
    }
}

/// Default LLM provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    /// Default model; `None` uses the provider's own default.
    pub model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "gemini".to_string(),
            model: None,
        }
    }
}

/// Artifact output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for per-execution artifact directories.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

/// Template rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Fail on undefined template variables. Strict by default — silent
    /// defaulting masks contract drift between templates and the context
    /// builder.
    pub strict: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Language preferences injected into prompt context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub answer: String,
    pub comment: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            answer: "english".to_string(),
            comment: "english".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with layering: global file, then environment
    /// overrides.
    pub fn load(env: &Env) -> Result<Self, ConfigError> {
        let mut config = match Self::global_config_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_vars(env);
        Ok(config)
    }

    /// Load a config from a specific file (tests and `--config`).
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Ok(val) = env.var(constants::ENV_PROVIDER) {
            self.provider.name = val;
        }
        if let Ok(val) = env.var(constants::ENV_MODEL) {
            self.provider.model = Some(val);
        }
        if let Ok(val) = env.var(constants::ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(val);
        }
        if let Ok(val) = env.var(constants::ENV_DB) {
            self.db_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = env.var(constants::ENV_ANSWER_LANGUAGE) {
            self.languages.answer = val;
        }
        if let Ok(val) = env.var(constants::ENV_COMMENT_LANGUAGE) {
            self.languages.comment = val;
        }
    }

    /// Resolve the repository setup directory.
    pub fn repos_dir(&self) -> PathBuf {
        self.repos_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join(constants::CONFIG_DIR).join(constants::REPOS_DIR))
                .unwrap_or_else(|| PathBuf::from(constants::REPOS_DIR))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider.name, "gemini");
        assert_eq!(config.provider.model, None);
        assert!(config.render.strict);
        assert_eq!(config.output.dir, PathBuf::from("output"));
        assert_eq!(config.languages.answer, "english");
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[provider]
name = "copilot-cli"
model = "gpt-4"

[output]
dir = "/tmp/reviews"

[render]
strict = false

[languages]
answer = "german"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.name, "copilot-cli");
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4"));
        assert_eq!(config.output.dir, PathBuf::from("/tmp/reviews"));
        assert!(!config.render.strict);
        assert_eq!(config.languages.answer, "german");
        assert_eq!(config.languages.comment, "english");
    }

    #[test]
    fn env_vars_override_file_values() {
        let env = Env::mock([
            (crate::constants::ENV_PROVIDER, "clipboard"),
            (crate::constants::ENV_MODEL, "manual"),
            (crate::constants::ENV_OUTPUT_DIR, "/tmp/out"),
            (crate::constants::ENV_ANSWER_LANGUAGE, "swedish"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_vars(&env);

        assert_eq!(config.provider.name, "clipboard");
        assert_eq!(config.provider.model.as_deref(), Some("manual"));
        assert_eq!(config.output.dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.languages.answer, "swedish");
    }

    #[test]
    fn load_file_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{ toml").unwrap();

        let result = AppConfig::load_file(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse"));
    }

    #[test]
    fn load_file_not_found() {
        let result = AppConfig::load_file(Path::new("/tmp/redline_no_such_config.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read"));
    }

    #[test]
    fn explicit_repos_dir_wins() {
        let config = AppConfig {
            repos_dir: Some(PathBuf::from("/etc/redline/repos")),
            ..AppConfig::default()
        };
        assert_eq!(config.repos_dir(), PathBuf::from("/etc/redline/repos"));
    }
}
