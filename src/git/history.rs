//! Tiered commit history between two refs.
//!
//! Density decays with distance: the most recent commits keep full
//! metadata, older ones shrink to one-line summaries, and everything
//! beyond the horizon is only counted. This bounds prompt payload while
//! preserving recency bias.

use std::path::Path;

use serde::Serialize;

use super::runner::run_git;
use crate::constants::{BODY_MAX_CHARS, BODY_TRUNCATION_MARKER, TIER1_LIMIT, TIER2_LIMIT};

/// Tier boundaries for [`commits_between`].
#[derive(Debug, Clone, Copy)]
pub struct TierLimits {
    /// Full detail for positions `[0, tier1)`.
    pub tier1: usize,
    /// Summaries for positions `[tier1, tier2)`; beyond is counted only.
    pub tier2: usize,
    /// Commit bodies are truncated at this many characters.
    pub body_max_chars: usize,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            tier1: TIER1_LIMIT,
            tier2: TIER2_LIMIT,
            body_max_chars: BODY_MAX_CHARS,
        }
    }
}

/// A fully-detailed commit (tier 1).
#[derive(Debug, Clone, Serialize)]
pub struct CommitRecord {
    /// Short hash (8 chars).
    pub hash: String,
    pub full_hash: String,
    pub author: String,
    /// ISO date, no time component.
    pub date: String,
    pub subject: String,
    /// Body truncated at `body_max_chars`, with a marker appended when
    /// truncation occurred.
    pub body: String,
    pub truncated: bool,
}

/// A summary-only commit (tier 2): provenance without payload.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub hash: String,
    pub date: String,
    pub subject: String,
}

/// The tiered history for a comparison range.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitHistory {
    pub tier1: Vec<CommitRecord>,
    pub tier2: Vec<CommitSummary>,
    pub total_count: usize,
    /// Commits beyond the tier-2 horizon, reported as a count only.
    pub truncated_count: usize,
}

impl CommitHistory {
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// Enumerate `target..source` (newest first) and partition into density
/// tiers.
///
/// A failing log command yields an empty history rather than an error:
/// context assembly degrades, it never aborts the run.
pub async fn commits_between(
    repo_path: &Path,
    target: &str,
    source: &str,
    limits: TierLimits,
) -> CommitHistory {
    // NUL between fields, record separator (0x1E) between commits so
    // multi-line bodies parse unambiguously.
    let range = format!("{target}..{source}");
    let out = match run_git(
        repo_path,
        &["log", "--format=%H%x00%an%x00%ai%x00%s%x00%b%x1E", &range],
    )
    .await
    {
        Ok(out) => out,
        Err(_) => return CommitHistory::default(),
    };

    let records: Vec<CommitRecord> = out
        .split('\x1e')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.split('\0').collect();
            if parts.len() < 4 {
                return None;
            }
            let full_hash = parts[0].to_string();
            let body = parts.get(4).map(|b| b.trim()).unwrap_or("");
            let (body, truncated) = truncate_body(body, limits.body_max_chars);
            Some(CommitRecord {
                hash: full_hash.chars().take(8).collect(),
                full_hash,
                author: parts[1].to_string(),
                date: parts[2]
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                subject: parts[3].to_string(),
                body,
                truncated,
            })
        })
        .collect();

    let total = records.len();
    let mut tier1 = records;
    let rest = tier1.split_off(tier1.len().min(limits.tier1));

    let tier2: Vec<CommitSummary> = rest
        .into_iter()
        .take(limits.tier2.saturating_sub(limits.tier1))
        .map(|c| CommitSummary {
            hash: c.hash,
            date: c.date,
            subject: c.subject,
        })
        .collect();

    CommitHistory {
        tier1,
        tier2,
        total_count: total,
        truncated_count: total.saturating_sub(limits.tier2),
    }
}

/// Truncate a commit body at `max_chars`, appending the truncation marker
/// when content was dropped.
fn truncate_body(body: &str, max_chars: usize) -> (String, bool) {
    if body.chars().count() > max_chars {
        let mut truncated: String = body.chars().take(max_chars).collect();
        truncated.push_str(BODY_TRUNCATION_MARKER);
        (truncated, true)
    } else {
        (body.to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truncate_body_exact_boundary() {
        let body = "a".repeat(500);
        let (out, truncated) = truncate_body(&body, 500);
        assert!(!truncated);
        assert_eq!(out.len(), 500);
    }

    #[test]
    fn truncate_body_appends_marker() {
        let body = "b".repeat(800);
        let (out, truncated) = truncate_body(&body, 500);
        assert!(truncated);
        assert_eq!(out, format!("{}{}", "b".repeat(500), BODY_TRUNCATION_MARKER));
    }

    async fn init_repo(path: &std::path::Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            tokio::process::Command::new("git")
                .arg("-C")
                .arg(path)
                .args(&args)
                .output()
                .await
                .unwrap();
        }
    }

    async fn commit_n(path: &std::path::Path, n: usize, body: Option<&str>) {
        tokio::fs::write(path.join("file.txt"), format!("{n}\n"))
            .await
            .unwrap();
        let message = match body {
            Some(b) => format!("commit {n}\n\n{b}"),
            None => format!("commit {n}"),
        };
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["add", "."])
            .output()
            .await
            .unwrap();
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["commit", "-m", &message])
            .output()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tier_accounting_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path();
        init_repo(p).await;

        commit_n(p, 0, None).await;
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(p)
            .args(["branch", "base"])
            .output()
            .await
            .unwrap();
        for n in 1..=8 {
            commit_n(p, n, None).await;
        }

        let limits = TierLimits {
            tier1: 3,
            tier2: 6,
            body_max_chars: 500,
        };
        let history = commits_between(p, "base", "HEAD", limits).await;

        assert_eq!(history.total_count, 8);
        assert_eq!(history.tier1.len(), 3);
        assert_eq!(history.tier2.len(), 3);
        assert_eq!(history.truncated_count, 2);
        assert_eq!(
            history.tier1.len() + history.tier2.len() + history.truncated_count,
            history.total_count
        );

        // Newest first
        assert_eq!(history.tier1[0].subject, "commit 8");
        assert_eq!(history.tier2[0].subject, "commit 5");
    }

    #[tokio::test]
    async fn tier1_keeps_detail_tier2_strips_it() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path();
        init_repo(p).await;

        commit_n(p, 0, None).await;
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(p)
            .args(["branch", "base"])
            .output()
            .await
            .unwrap();
        commit_n(p, 1, Some("older body")).await;
        commit_n(p, 2, Some("newer body")).await;

        let limits = TierLimits {
            tier1: 1,
            tier2: 50,
            body_max_chars: 500,
        };
        let history = commits_between(p, "base", "HEAD", limits).await;

        assert_eq!(history.tier1.len(), 1);
        assert_eq!(history.tier1[0].body, "newer body");
        assert_eq!(history.tier1[0].author, "Test");
        assert_eq!(history.tier1[0].hash.len(), 8);
        assert!(!history.tier1[0].date.contains(' '), "date only, no time");

        assert_eq!(history.tier2.len(), 1);
        assert_eq!(history.tier2[0].subject, "commit 1");
    }

    #[tokio::test]
    async fn long_body_truncated_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path();
        init_repo(p).await;

        commit_n(p, 0, None).await;
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(p)
            .args(["branch", "base"])
            .output()
            .await
            .unwrap();
        let long_body = "x".repeat(800);
        commit_n(p, 1, Some(&long_body)).await;

        let history = commits_between(p, "base", "HEAD", TierLimits::default()).await;
        assert_eq!(history.tier1.len(), 1);
        let record = &history.tier1[0];
        assert!(record.truncated);
        assert!(record.body.ends_with(BODY_TRUNCATION_MARKER));
        assert_eq!(
            record.body.chars().count(),
            500 + BODY_TRUNCATION_MARKER.chars().count()
        );
    }

    #[tokio::test]
    async fn failing_log_yields_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = commits_between(dir.path(), "a", "b", TierLimits::default()).await;
        assert!(history.is_empty());
        assert_eq!(history.truncated_count, 0);
    }
}
