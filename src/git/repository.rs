//! Git repository operations

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use git2::{Oid, Repository};

use crate::utils::preflight::PreflightError;

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

/// The target ref a pull request is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// The name as given by the user.
    pub name: String,
    /// The reference that actually resolved (`main` or `origin/main`).
    pub reference: String,
    /// Commit the reference points to.
    pub oid: Oid,
}

impl GitRepository {
    /// Open repository at current directory
    pub fn open() -> Result<Self> {
        Self::open_at(".")
    }

    /// Open repository containing the specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .map_err(|_| PreflightError::NotARepository(path.to_path_buf()))?;

        Ok(Self { repo })
    }

    /// Get workdir path
    pub fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .context("Repository has no working directory (bare repository)")
    }

    /// Get access to the underlying git2::Repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Get current branch name, or `HEAD` when detached
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().context("Failed to get HEAD reference")?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    /// Get the commit HEAD points to
    pub fn head_oid(&self) -> Result<Oid> {
        let head = self.repo.head().context("Failed to get HEAD reference")?;
        let commit = head
            .peel_to_commit()
            .context("Failed to peel HEAD to commit")?;
        Ok(commit.id())
    }

    /// Resolves the target branch, falling back to its `origin/` remote-tracking ref.
    pub fn resolve_target(&self, target: &str) -> Result<ResolvedTarget, PreflightError> {
        let candidates = [target.to_string(), format!("origin/{target}")];

        for candidate in candidates {
            let commit = self
                .repo
                .revparse_single(&candidate)
                .and_then(|obj| obj.peel_to_commit());
            if let Ok(commit) = commit {
                tracing::debug!("Resolved target {target} as {candidate} ({})", commit.id());
                return Ok(ResolvedTarget {
                    name: target.to_string(),
                    reference: candidate,
                    oid: commit.id(),
                });
            }
        }

        Err(PreflightError::TargetNotFound(target.to_string()))
    }

    /// Finds the commit where HEAD diverged from `target`.
    pub fn merge_base(&self, target: Oid) -> Result<Oid> {
        let head = self.head_oid()?;
        self.repo
            .merge_base(target, head)
            .with_context(|| format!("No common ancestor between HEAD and {target}"))
    }

    /// Runs `git diff --name-status` from `base` to HEAD, with rename detection.
    pub fn name_status_diff(&self, base: Oid) -> Result<String> {
        let workdir = self.workdir()?;
        let base = base.to_string();

        let output = Command::new("git")
            .current_dir(&workdir)
            .args([
                "-c",
                "core.quotepath=off",
                "diff",
                "--name-status",
                "-M",
                &base,
                "HEAD",
            ])
            .output()
            .context("Failed to execute git diff --name-status")?;

        if !output.status.success() {
            anyhow::bail!(
                "git diff --name-status failed (exit={}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
