//! Repository setup files: markdown with YAML frontmatter.
//!
//! Each configured repository has a `repos/<name>.md` file whose
//! frontmatter supplies the repository path, remote, main branch, an
//! optional diff token limit, a default workflow, and the per-workflow
//! prompt/provider/model table. The markdown body below the frontmatter
//! is free-form notes and is ignored by the engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Per-workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Prompt template path; relative paths resolve against the setup
    /// file's directory.
    pub prompt: PathBuf,
    /// Provider name override; `None` uses the app default.
    #[serde(default)]
    pub provider: Option<String>,
    /// Model override; `None` uses the provider default.
    #[serde(default)]
    pub model: Option<String>,
}

/// Parsed repository setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSetup {
    pub path: PathBuf,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    /// Diffs estimated above this many tokens are pruned to `--stat`.
    #[serde(default)]
    pub token_limit: Option<usize>,
    #[serde(default)]
    pub default_workflow: Option<String>,
    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowSpec>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_main_branch() -> String {
    "main".to_string()
}

impl RepoSetup {
    /// Look up a workflow, falling back to the configured default, then
    /// to `pr_review`.
    pub fn resolve_workflow(
        &self,
        repo_name: &str,
        requested: Option<&str>,
    ) -> Result<(String, &WorkflowSpec), ConfigError> {
        let name = requested
            .map(String::from)
            .or_else(|| self.default_workflow.clone())
            .unwrap_or_else(|| "pr_review".to_string());

        match self.workflows.get(&name) {
            Some(spec) => Ok((name, spec)),
            None => Err(ConfigError::UnknownWorkflow {
                workflow: name,
                repo: repo_name.to_string(),
                available: self.workflows.keys().cloned().collect::<Vec<_>>().join(", "),
            }),
        }
    }
}

/// Parse a setup file's content into a [`RepoSetup`].
pub fn parse_repo_setup(content: &str, origin: &Path) -> Result<RepoSetup, ConfigError> {
    let frontmatter = split_frontmatter(content).ok_or_else(|| ConfigError::InvalidSetup {
        path: origin.to_path_buf(),
        message: "setup file must start with YAML frontmatter (---)".to_string(),
    })?;

    serde_yaml_ng::from_str(&frontmatter).map_err(|e| ConfigError::InvalidSetup {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load `repos_dir/<name>.md`.
pub fn load_repo_setup(repos_dir: &Path, name: &str) -> Result<RepoSetup, ConfigError> {
    let path = repos_dir.join(format!("{name}.md"));
    if !path.exists() {
        return Err(ConfigError::UnknownRepository {
            name: name.to_string(),
            path,
        });
    }
    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
        path: path.clone(),
        source: e,
    })?;
    parse_repo_setup(&content, &path)
}

/// List configured repository names, sorted. README and TEMPLATE files
/// are not repositories.
pub fn list_repositories(repos_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(repos_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(|e| {
            e.path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(String::from)
        })
        .filter(|name| {
            let upper = name.to_uppercase();
            upper != "README" && upper != "TEMPLATE"
        })
        .collect();
    names.sort();
    names
}

/// Split content into its YAML frontmatter, or `None` when the marker
/// structure is missing.
fn split_frontmatter(content: &str) -> Option<String> {
    let content = content.trim_start();
    let after_first = content.strip_prefix("---")?;
    let end = after_first.find("\n---")?;
    Some(after_first[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SETUP: &str = r#"---
path: /home/dev/myproject
remote: upstream
main_branch: trunk
token_limit: 50000
default_workflow: pr_review
workflows:
  pr_review:
    prompt: prompts/pr_review.md
    provider: gemini
    model: gemini-1.5-pro
  explain_diff:
    prompt: prompts/explain.md
---

Notes about this repository.
"#;

    #[test]
    fn parse_full_setup() {
        let setup = parse_repo_setup(SETUP, Path::new("myproject.md")).unwrap();
        assert_eq!(setup.path, PathBuf::from("/home/dev/myproject"));
        assert_eq!(setup.remote, "upstream");
        assert_eq!(setup.main_branch, "trunk");
        assert_eq!(setup.token_limit, Some(50000));
        assert_eq!(setup.workflows.len(), 2);

        let spec = &setup.workflows["pr_review"];
        assert_eq!(spec.provider.as_deref(), Some("gemini"));
        assert_eq!(spec.model.as_deref(), Some("gemini-1.5-pro"));
    }

    #[test]
    fn defaults_applied_when_omitted() {
        let minimal = "---\npath: /x\nworkflows:\n  pr_review:\n    prompt: p.md\n---\n";
        let setup = parse_repo_setup(minimal, Path::new("x.md")).unwrap();
        assert_eq!(setup.remote, "origin");
        assert_eq!(setup.main_branch, "main");
        assert_eq!(setup.token_limit, None);
    }

    #[test]
    fn missing_frontmatter_is_invalid() {
        let err = parse_repo_setup("just a markdown file", Path::new("bad.md")).unwrap_err();
        assert!(err.to_string().contains("frontmatter"));
    }

    #[test]
    fn resolve_workflow_precedence() {
        let setup = parse_repo_setup(SETUP, Path::new("myproject.md")).unwrap();

        let (name, _) = setup.resolve_workflow("myproject", Some("explain_diff")).unwrap();
        assert_eq!(name, "explain_diff");

        let (name, spec) = setup.resolve_workflow("myproject", None).unwrap();
        assert_eq!(name, "pr_review");
        assert_eq!(spec.prompt, PathBuf::from("prompts/pr_review.md"));
    }

    #[test]
    fn unknown_workflow_names_alternatives() {
        let setup = parse_repo_setup(SETUP, Path::new("myproject.md")).unwrap();
        let err = setup.resolve_workflow("myproject", Some("missing")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("pr_review"));
        assert!(msg.contains("explain_diff"));
    }

    #[test]
    fn load_and_list_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("beta.md"), SETUP).unwrap();
        std::fs::write(dir.path().join("alpha.md"), SETUP).unwrap();
        std::fs::write(dir.path().join("README.md"), "# docs").unwrap();
        std::fs::write(dir.path().join("TEMPLATE.md"), "---\npath: /t\n---").unwrap();

        assert_eq!(list_repositories(dir.path()), vec!["alpha", "beta"]);

        let setup = load_repo_setup(dir.path(), "alpha").unwrap();
        assert_eq!(setup.main_branch, "trunk");

        let err = load_repo_setup(dir.path(), "gone").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRepository { .. }));
    }
}
