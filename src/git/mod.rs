//! Git collaborator: ref resolution, diff generation, and commit history.
//!
//! Shells out to `git` via `tokio::process::Command`. Every invocation is
//! read-only — this module never mutates the target repository.

pub mod diff;
pub mod history;
pub mod refs;
mod runner;

use std::path::PathBuf;

use thiserror::Error;

pub use diff::{branches, changed_files, get_diff, is_clean_working_directory, is_valid_repository, recent_commits};
pub use history::{commits_between, CommitHistory, CommitRecord, CommitSummary, TierLimits};
pub use refs::{determine_refs, smart_refs, RefPair, WORKING_DIRECTORY};
pub use runner::run_git;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("git executable not found — ensure git is installed and in PATH")]
    NotInstalled,

    #[error("git {command} failed in {path} (exit {status}): {stderr}")]
    CommandFailed {
        path: PathBuf,
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("git output is not valid UTF-8: {0}")]
    InvalidOutput(String),

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}
