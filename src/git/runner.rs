//! Single choke point for git subprocess invocation.

use std::path::Path;

use tokio::process::Command;

use super::GitError;

/// Run `git -C <repo_path> <args>` and return stdout.
///
/// A missing binary becomes [`GitError::NotInstalled`]; a non-zero exit
/// becomes [`GitError::CommandFailed`] carrying the repo path, command
/// line, and stderr so failures can be diagnosed without re-running.
pub async fn run_git(repo_path: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::NotInstalled
            } else {
                GitError::Io(e)
            }
        })?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            path: repo_path.to_path_buf(),
            command: args.join(" "),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| GitError::InvalidOutput(e.to_string()))
}
