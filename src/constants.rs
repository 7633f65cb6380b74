//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and pipeline defaults so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "redline";

/// Crate version, surfaced by the `version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "redline";

/// Database filename under the data directory.
pub const DB_FILENAME: &str = "history.sqlite3";

/// Directory (relative to the config root) holding repository setup files.
pub const REPOS_DIR: &str = "repos";

/// Rough chars-per-token heuristic used for diff pruning and dry-run
/// token estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Full commit detail for the first N commits of a comparison range.
pub const TIER1_LIMIT: usize = 10;

/// One-line commit summaries up to this position; everything beyond is
/// only counted.
pub const TIER2_LIMIT: usize = 50;

/// Commit bodies are truncated at this many characters.
pub const BODY_MAX_CHARS: usize = 500;

/// Marker appended to a commit body when it was truncated.
pub const BODY_TRUNCATION_MARKER: &str = " [...Truncated for Context...]";

/// Historical context entries injected into a prompt per run.
pub const CONTEXT_LIMIT: usize = 3;

/// Default timeout for a single provider call.
pub const PROVIDER_TIMEOUT_SECS: u64 = 300;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "REDLINE_PROVIDER";
pub const ENV_MODEL: &str = "REDLINE_MODEL";
pub const ENV_DB: &str = "REDLINE_DB";
pub const ENV_OUTPUT_DIR: &str = "REDLINE_OUTPUT_DIR";
pub const ENV_ANSWER_LANGUAGE: &str = "ANSWER_LANGUAGE";
pub const ENV_COMMENT_LANGUAGE: &str = "COMMENT_LANGUAGE";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
