//! Per-execution artifact persistence.
//!
//! Each run writes into a timestamped, repo-and-workflow-named directory
//! under the output root: the raw diff, both prompt renderings, and the
//! model's output in the configured format.

use std::path::{Path, PathBuf};

use crate::prompt::RenderedPrompts;

use super::config::OutputFormat;

/// Compute the execution directory path for a run. Not created on disk
/// until something is written.
pub fn execution_dir(output_root: &Path, repo_name: &str, workflow: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%dT%H%M%S");
    output_root.join(format!("{timestamp}-{repo_name}-{workflow}"))
}

/// Persist the diff and both prompt renderings.
pub fn write_run_artifacts(
    dir: &Path,
    diff: &str,
    prompts: &RenderedPrompts,
) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join("diff.patch"), diff)?;
    std::fs::write(dir.join("prompt.txt"), &prompts.full)?;
    std::fs::write(dir.join("prompt_base.txt"), &prompts.base)?;
    Ok(())
}

/// Persist only the full prompt (dry-run mode).
pub fn write_prompt_artifact(dir: &Path, full_prompt: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("prompt.txt");
    std::fs::write(&path, full_prompt)?;
    Ok(path)
}

/// Persist the LLM response in the configured format.
pub fn write_response(
    dir: &Path,
    format: OutputFormat,
    response: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("llm_result.{}", format.extension()));
    std::fs::write(&path, response)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::RenderedPrompts;

    #[test]
    fn execution_dir_embeds_repo_and_workflow() {
        let dir = execution_dir(Path::new("/tmp/out"), "myrepo", "pr_review");
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-myrepo-pr_review"), "got: {name}");
        assert!(dir.starts_with("/tmp/out"));
    }

    #[test]
    fn run_artifacts_written() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run");
        let prompts = RenderedPrompts {
            full: "full prompt".to_string(),
            base: "base prompt".to_string(),
        };

        write_run_artifacts(&dir, "the diff", &prompts).unwrap();
        let result = write_response(&dir, OutputFormat::Markdown, "the answer").unwrap();

        assert_eq!(std::fs::read_to_string(dir.join("diff.patch")).unwrap(), "the diff");
        assert_eq!(std::fs::read_to_string(dir.join("prompt.txt")).unwrap(), "full prompt");
        assert_eq!(
            std::fs::read_to_string(dir.join("prompt_base.txt")).unwrap(),
            "base prompt"
        );
        assert_eq!(result.file_name().unwrap(), "llm_result.md");
        assert_eq!(std::fs::read_to_string(result).unwrap(), "the answer");
    }

    #[test]
    fn json_format_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_response(tmp.path(), OutputFormat::Json, "{}").unwrap();
        assert_eq!(path.file_name().unwrap(), "llm_result.json");
    }
}
