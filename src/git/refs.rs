//! Ref resolution: turning user-supplied ref/commit hints into a concrete
//! comparison pair.
//!
//! Two comparison semantics exist and must not be conflated:
//! two-dot (`A..B`, exact commit-to-commit) and three-dot (`A...B`, diff
//! from the merge-base of A and B). [`RefPair::is_direct`] records which
//! one applies.

use serde::Serialize;

/// Sentinel source label meaning "compare against the working directory".
pub const WORKING_DIRECTORY: &str = "Working Directory";

/// A resolved comparison between two endpoints.
///
/// `source == None` means the working directory: the diff is taken against
/// `target` with no second ref. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefPair {
    pub target: String,
    pub source: Option<String>,
    /// `true` → two-dot semantics, `false` → merge-base (three-dot).
    pub is_direct: bool,
}

impl RefPair {
    /// Render the range argument passed to `git diff`.
    pub fn range(&self) -> String {
        match &self.source {
            Some(source) if self.is_direct => format!("{}..{}", self.target, source),
            Some(source) => format!("{}...{}", self.target, source),
            None => self.target.clone(),
        }
    }

    /// Label for the source side (used in prompt context and logs).
    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or(WORKING_DIRECTORY)
    }
}

impl std::fmt::Display for RefPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.range())
    }
}

/// Determine the comparison pair for a workflow run.
///
/// - `commit` given: target is its parent (`{commit}~1`), source is the
///   commit itself — analyzing exactly one commit's changes, so the
///   comparison is direct.
/// - Otherwise: target defaults to `{remote}/{main_branch}`, source to
///   `HEAD`, compared from the merge-base.
/// - Explicit `target_ref`/`source_ref` always override the defaults.
pub fn determine_refs(
    target_ref: Option<&str>,
    source_ref: Option<&str>,
    commit: Option<&str>,
    remote: &str,
    main_branch: &str,
) -> RefPair {
    let target = match (target_ref, commit) {
        (Some(t), _) => t.to_string(),
        (None, Some(c)) => format!("{c}~1"),
        (None, None) => format!("{remote}/{main_branch}"),
    };

    let source = match (source_ref, commit) {
        (Some(s), _) => s.to_string(),
        (None, Some(c)) => c.to_string(),
        (None, None) => "HEAD".to_string(),
    };

    RefPair {
        target,
        source: Some(source),
        is_direct: commit.is_some(),
    }
}

/// Resolve refs for callers that select branches and, optionally, specific
/// commits per side (the interactive selection model).
///
/// A specific commit on either side forces a direct comparison. Identical
/// target and source fall back to comparing the detected main branch
/// against `HEAD` with merge-base semantics, preventing a degenerate empty
/// self-diff. Pure logic over the supplied branch list — no subprocess
/// calls.
pub fn smart_refs(
    branches: &[String],
    target: &str,
    source: &str,
    target_commit: Option<&str>,
    source_commit: Option<&str>,
) -> RefPair {
    let pick = |commit: Option<&str>, fallback: &str| -> String {
        match commit {
            Some(c) if c != "None" => c.to_string(),
            _ => fallback.to_string(),
        }
    };

    let final_target = pick(target_commit, target);

    if source == WORKING_DIRECTORY {
        return RefPair {
            target: final_target,
            source: None,
            is_direct: true,
        };
    }

    let final_source = pick(source_commit, source);
    let is_direct = target_commit.is_some_and(|c| c != "None")
        || source_commit.is_some_and(|c| c != "None");

    if final_target == final_source {
        let base = if branches.iter().any(|b| b == "main") {
            "main".to_string()
        } else if branches.iter().any(|b| b == "master") {
            "master".to_string()
        } else {
            target.to_string()
        };
        return RefPair {
            target: base,
            source: Some("HEAD".to_string()),
            is_direct: false,
        };
    }

    RefPair {
        target: final_target,
        source: Some(final_source),
        is_direct,
    }
}
