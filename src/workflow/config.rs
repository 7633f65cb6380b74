//! Immutable configuration for a single workflow execution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::{RepoSetup, WorkflowSpec};

/// Output format for the persisted LLM result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    /// File extension for the result artifact.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// One execution request, frozen at construction.
///
/// Fields never mutate in place: [`WorkflowConfig::with_loaded`] produces
/// an enriched copy, preserving the original for audit trails. The
/// JSON snapshot ([`WorkflowConfig::to_snapshot`]) is stored alongside
/// results so historical analyses can be replayed with their exact
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    // Core settings (from user input)
    pub repo_name: String,
    pub workflow: Option<String>,
    pub target_ref: Option<String>,
    pub source_ref: Option<String>,
    pub commit: Option<String>,
    pub dry_run: bool,
    pub output_format: OutputFormat,
    pub language: Option<String>,
    pub debug: bool,
    pub provider: Option<String>,
    pub model: Option<String>,

    // Populated by configuration loading
    #[serde(default)]
    pub repo_path: PathBuf,
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub token_limit: Option<usize>,
    /// Workflow sub-configuration. Large and derived — excluded from the
    /// snapshot.
    #[serde(skip)]
    pub workflow_spec: Option<WorkflowSpec>,
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

impl WorkflowConfig {
    /// A request with defaults for everything but the repository name.
    pub fn new(repo_name: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            workflow: None,
            target_ref: None,
            source_ref: None,
            commit: None,
            dry_run: false,
            output_format: OutputFormat::default(),
            language: None,
            debug: false,
            provider: None,
            model: None,
            repo_path: PathBuf::new(),
            main_branch: default_main_branch(),
            remote: default_remote(),
            token_limit: None,
            workflow_spec: None,
        }
    }

    /// Produce the enriched copy after configuration loading. The
    /// original request stays untouched.
    pub fn with_loaded(&self, workflow: String, setup: &RepoSetup, spec: WorkflowSpec) -> Self {
        Self {
            workflow: Some(workflow),
            repo_path: setup.path.clone(),
            main_branch: setup.main_branch.clone(),
            remote: setup.remote.clone(),
            token_limit: setup.token_limit,
            workflow_spec: Some(spec),
            ..self.clone()
        }
    }

    /// Serialize to the JSON snapshot stored with each analysis.
    pub fn to_snapshot(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Restore a config from a stored snapshot.
    pub fn from_snapshot(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Name of the workflow once loading resolved it.
    pub fn workflow_name(&self) -> &str {
        self.workflow.as_deref().unwrap_or("pr_review")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn sample_setup() -> RepoSetup {
        let mut workflows = BTreeMap::new();
        workflows.insert(
            "pr_review".to_string(),
            WorkflowSpec {
                prompt: PathBuf::from("prompts/pr_review.md"),
                provider: Some("gemini".to_string()),
                model: None,
            },
        );
        RepoSetup {
            path: PathBuf::from("/home/dev/myproject"),
            remote: "upstream".to_string(),
            main_branch: "trunk".to_string(),
            token_limit: Some(40000),
            default_workflow: Some("pr_review".to_string()),
            workflows,
        }
    }

    #[test]
    fn with_loaded_preserves_original() {
        let request = WorkflowConfig::new("myproject");
        let setup = sample_setup();
        let spec = setup.workflows["pr_review"].clone();

        let loaded = request.with_loaded("pr_review".to_string(), &setup, spec);

        // Original untouched
        assert_eq!(request.repo_path, PathBuf::new());
        assert_eq!(request.workflow, None);

        // Copy enriched
        assert_eq!(loaded.repo_path, PathBuf::from("/home/dev/myproject"));
        assert_eq!(loaded.main_branch, "trunk");
        assert_eq!(loaded.remote, "upstream");
        assert_eq!(loaded.token_limit, Some(40000));
        assert_eq!(loaded.workflow_name(), "pr_review");
        assert!(loaded.workflow_spec.is_some());
    }

    #[test]
    fn snapshot_roundtrip_excludes_derived_spec() {
        let request = WorkflowConfig::new("myproject");
        let setup = sample_setup();
        let spec = setup.workflows["pr_review"].clone();
        let loaded = request.with_loaded("pr_review".to_string(), &setup, spec);

        let snapshot = loaded.to_snapshot();
        assert!(snapshot.contains("myproject"));
        assert!(snapshot.contains("trunk"));
        assert!(!snapshot.contains("prompts/pr_review.md"));

        let restored = WorkflowConfig::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.repo_name, "myproject");
        assert_eq!(restored.main_branch, "trunk");
        assert!(restored.workflow_spec.is_none());
    }

    #[test]
    fn output_format_strings() {
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }
}
