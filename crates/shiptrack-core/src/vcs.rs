//! Local working-copy operations through the `git` binary

use crate::error::{Error, Result};
use crate::traits::Vcs;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Remote every pull/push targets
const REMOTE: &str = "origin";

/// Runs `git` subcommands in a working copy
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    /// Use a specific git executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one git command; non-zero exit carries stdout and stderr
    async fn run(&self, path: &Path, args: &[&str]) -> Result<String> {
        debug!(path = %path.display(), ?args, "git");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| Error::Vcs(format!("failed to run git {}: {}", args.join(" "), e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Vcs(format!(
            "git {} exited with {}: {}{}",
            args.join(" "),
            output.status,
            stdout.trim(),
            if stderr.trim().is_empty() {
                String::new()
            } else {
                format!("\n{}", stderr.trim())
            }
        )))
    }

    pub async fn checkout(&self, path: &Path, branch: &str, create: bool) -> Result<()> {
        if create {
            // -B creates or resets, so re-running a release is safe
            self.run(path, &["checkout", "-B", branch]).await?;
        } else {
            self.run(path, &["checkout", branch]).await?;
        }
        Ok(())
    }

    pub async fn pull(&self, path: &Path, branch: &str) -> Result<()> {
        self.run(path, &["pull", "--ff-only", REMOTE, branch]).await?;
        Ok(())
    }

    pub async fn commit(&self, path: &Path, message: &str) -> Result<()> {
        self.run(path, &["add", "-A"]).await?;
        self.run(path, &["commit", "-m", message]).await?;
        Ok(())
    }

    pub async fn push(&self, path: &Path, branch: &str) -> Result<()> {
        self.run(path, &["push", "-u", REMOTE, branch]).await?;
        Ok(())
    }
}

impl Vcs for GitCli {
    fn checkout<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
        create: bool,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::checkout(self, path, branch, create)
    }

    fn pull<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::pull(self, path, branch)
    }

    fn commit<'a>(
        &'a self,
        path: &'a Path,
        message: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::commit(self, path, message)
    }

    fn push<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::push(self, path, branch)
    }
}
