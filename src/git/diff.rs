//! Diff generation, repository checks, and branch/commit listing.

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use super::refs::RefPair;
use super::runner::run_git;
use super::GitError;

/// Generate the diff for a resolved comparison.
///
/// `stat_only` switches to `git diff --stat`, used when a full diff blows
/// the token budget.
pub async fn get_diff(repo_path: &Path, pair: &RefPair, stat_only: bool) -> Result<String, GitError> {
    let range = pair.range();
    let mut args = vec!["diff"];
    if stat_only {
        args.push("--stat");
    }
    args.push(&range);
    run_git(repo_path, &args).await
}

/// List the files changed between the two endpoints of a comparison.
pub async fn changed_files(repo_path: &Path, pair: &RefPair) -> Result<Vec<String>, GitError> {
    let range = pair.range();
    let out = run_git(repo_path, &["diff", "--name-only", &range]).await?;
    Ok(out
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .collect())
}

/// Check whether the path is a valid git repository.
pub async fn is_valid_repository(repo_path: &Path) -> bool {
    run_git(repo_path, &["rev-parse", "--git-dir"]).await.is_ok()
}

/// Check whether the working directory is clean.
///
/// Returns `(is_clean, porcelain_status)`.
pub async fn is_clean_working_directory(repo_path: &Path) -> Result<(bool, String), GitError> {
    let status = run_git(repo_path, &["status", "--porcelain"]).await?;
    let status = status.trim().to_string();
    Ok((status.is_empty(), status))
}

/// List local and remote branches, priority branches first.
///
/// Falls back to `["main"]` on any failure — branch listing backs
/// interactive selection and must stay responsive rather than fail.
pub async fn branches(repo_path: &Path) -> Vec<String> {
    const PRIORITY: &[&str] = &["HEAD", "main", "master", "origin/main", "origin/master"];

    match run_git(repo_path, &["branch", "-a", "--format=%(refname:short)"]).await {
        Ok(out) => {
            let mut names: Vec<String> = out
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.contains("->"))
                .map(String::from)
                .collect();
            names.sort();
            names.dedup();
            names.sort_by_key(|b| {
                (
                    PRIORITY
                        .iter()
                        .position(|p| *p == b.as_str())
                        .unwrap_or(usize::MAX),
                    b.clone(),
                )
            });
            names
        }
        Err(e) => {
            warn!("branch listing failed, falling back to [main]: {e}");
            vec!["main".to_string()]
        }
    }
}

/// A commit as listed by [`recent_commits`].
#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

impl CommitInfo {
    /// One-line label for selection lists.
    pub fn label(&self) -> String {
        format!("{} - {} ({})", self.hash, self.subject, self.date)
    }
}

/// List recent commits reachable from a ref.
///
/// Uses a NUL-delimited log format so subjects containing arbitrary
/// punctuation parse cleanly.
pub async fn recent_commits(
    repo_path: &Path,
    reference: &str,
    limit: usize,
) -> Result<Vec<CommitInfo>, GitError> {
    let count = limit.to_string();
    let out = run_git(
        repo_path,
        &[
            "log",
            reference,
            "-n",
            &count,
            "--date=iso",
            "--format=%h%x00%ad%x00%an%x00%s",
        ],
    )
    .await?;

    Ok(out
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\0').collect();
            if parts.len() < 4 {
                return None;
            }
            Some(CommitInfo {
                hash: parts[0].to_string(),
                date: parts[1].to_string(),
                author: parts[2].to_string(),
                subject: parts[3].to_string(),
            })
        })
        .collect())
}
