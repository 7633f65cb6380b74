//! Configuration loading and layering.
//!
//! Two configuration sources feed a workflow run:
//! - the app config (`~/.config/redline/config.toml` plus environment
//!   overrides) supplying defaults — provider, model, output root,
//!   rendering strictness, answer/comment languages;
//! - per-repository setup files (`repos/<name>.md`, YAML frontmatter)
//!   supplying the repository path, remote, main branch, token limit, and
//!   the workflow table.

mod loader;
pub mod repo;

pub use loader::{AppConfig, LanguageConfig, OutputConfig, ProviderConfig, RenderConfig};
pub use repo::{list_repositories, load_repo_setup, parse_repo_setup, RepoSetup, WorkflowSpec};

use std::path::PathBuf;

use thiserror::Error;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid repository setup {path}: {message}")]
    InvalidSetup { path: PathBuf, message: String },

    #[error("repository '{name}' is not configured — expected setup file {path}")]
    UnknownRepository { name: String, path: PathBuf },

    #[error("workflow '{workflow}' not defined for repository '{repo}'. Available workflows: {available}")]
    UnknownWorkflow {
        workflow: String,
        repo: String,
        available: String,
    },
}
