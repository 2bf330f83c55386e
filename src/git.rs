#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Remote repository plumbing, consumed strictly through the `git` binary:
//! idempotent checkouts for remote sources, report push-back, and remote URL
//! detection.

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use which::which;

use crate::{constants::DEFAULT_REPO_BRANCH, process, util};

/// A remote repository reference: URL plus the branch to check out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    /// Clone/push URL of the repository.
    pub url:    String,
    /// Branch checked out after cloning and pulled on reuse.
    pub branch: String,
}

impl RemoteRepo {
    /// Creates a reference to `url`, on the default branch.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url:    url.into(),
            branch: DEFAULT_REPO_BRANCH.to_string(),
        }
    }

    /// Creates a reference to `url` on a specific branch.
    pub fn with_branch(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url:    url.into(),
            branch: branch.into(),
        }
    }

    /// Short repository name derived from the final URL segment.
    pub fn name(&self) -> &str {
        self.url
            .rsplit('/')
            .next()
            .unwrap_or(&self.url)
            .trim_end_matches(".git")
    }
}

/// Finds and returns the path to the git binary.
fn git_path() -> Result<OsString> {
    which("git")
        .map(PathBuf::into_os_string)
        .context("Cannot find git on path")
}

/// Runs a git subcommand and fails with its stderr when it exits non-zero.
///
/// Unlike test-engine invocations, a failing git command is always fatal to
/// the operation that issued it.
async fn git(args: &[&OsStr], cwd: Option<&Path>) -> Result<process::Collected> {
    let collected = process::run_collect(git_path()?, args, cwd, None).await?;
    if !collected.status.success() {
        bail!(
            "git {} failed: {}",
            args.first()
                .map(|a| a.to_string_lossy())
                .unwrap_or_default(),
            collected.stderr_lossy().trim()
        );
    }
    Ok(collected)
}

/// Materializes `repo` at `checkout_dir`.
///
/// When the directory already exists it is reused: the configured branch is
/// checked out and fast-forwarded with a pull instead of re-cloning. Clone,
/// checkout, and pull failures all propagate to the caller.
pub async fn clone_or_update(repo: &RemoteRepo, checkout_dir: &Path) -> Result<()> {
    if checkout_dir.exists() {
        info!(
            "reusing existing clone of {} at {}",
            repo.name(),
            checkout_dir.display()
        );
        git(
            &[
                OsStr::new("checkout"),
                OsStr::new(repo.branch.as_str()),
            ],
            Some(checkout_dir),
        )
        .await
        .with_context(|| format!("Could not checkout branch {} of {}", repo.branch, repo.url))?;
        git(&[OsStr::new("pull")], Some(checkout_dir))
            .await
            .with_context(|| format!("Could not pull latest for {}", repo.url))?;
    } else {
        info!("cloning {} into {}", repo.url, checkout_dir.display());
        git(
            &[
                OsStr::new("clone"),
                OsStr::new("--branch"),
                OsStr::new(repo.branch.as_str()),
                OsStr::new(repo.url.as_str()),
                checkout_dir.as_os_str(),
            ],
            None,
        )
        .await
        .with_context(|| format!("Could not clone {}", repo.url))?;
    }
    Ok(())
}

/// Pushes a single file to `repo`: clone to `scratch`, check out the branch,
/// copy the file in, commit, push. The scratch clone is removed on every exit
/// path, success or failure.
pub async fn push_file(file: &Path, repo: &RemoteRepo, scratch: &Path) -> Result<()> {
    let result = push_file_inner(file, repo, scratch).await;
    if let Err(err) = util::remove_tree_forced(scratch) {
        warn!(
            "could not remove scratch clone at {}: {err:#}",
            scratch.display()
        );
    }
    result
}

/// The fallible portion of [`push_file`], separated so the scratch clone can
/// be torn down unconditionally.
async fn push_file_inner(file: &Path, repo: &RemoteRepo, scratch: &Path) -> Result<()> {
    let file_name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;

    clone_or_update(repo, scratch).await?;

    std::fs::copy(file, scratch.join(file_name)).with_context(|| {
        format!("Could not copy {} into {}", file.display(), scratch.display())
    })?;

    git(&[OsStr::new("add"), file_name], Some(scratch)).await?;
    let message = format!("Add {}", file_name.to_string_lossy());
    git(
        &[OsStr::new("commit"), OsStr::new("-m"), OsStr::new(&message)],
        Some(scratch),
    )
    .await?;
    git(
        &[
            OsStr::new("push"),
            OsStr::new("origin"),
            OsStr::new(repo.branch.as_str()),
        ],
        Some(scratch),
    )
    .await
    .with_context(|| format!("Could not push {} to {}", file.display(), repo.url))?;

    info!("pushed {} to {}", file.display(), repo.url);
    Ok(())
}

/// Returns the `origin` remote URL of the repository containing `dir`, if
/// any. Detection failures are not errors, merely `None`.
pub async fn detect_remote_url(dir: &Path) -> Option<String> {
    let args = [
        OsStr::new("config"),
        OsStr::new("--get"),
        OsStr::new("remote.origin.url"),
    ];
    let collected = process::run_collect(git_path().ok()?, &args, Some(dir), None)
        .await
        .ok()?;
    if !collected.status.success() {
        return None;
    }
    let url = collected.stdout_lossy().trim().to_string();
    if url.is_empty() { None } else { Some(url) }
}
