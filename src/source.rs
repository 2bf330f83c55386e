#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Source resolution and staging.
//!
//! A [`Source`] is one logical body of files, code or tests, student or
//! instructor reference. It resolves to a concrete directory tree (an
//! existing local path, or a clone of a remote repository) and is staged by
//! copying that tree into a private working directory, where it owns its own
//! execution environment when it carries code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use tracing::{debug, info, warn};

use crate::{
    config::SourceConfig,
    constants::{
        DEFAULT_CODE_DIRNAME, DEFAULT_TESTS_DIRNAME, DEFAULT_VENV_DIRNAME, MASTER_CODE_DIRNAME,
        MASTER_TESTS_DIRNAME, MASTER_VENV_DIRNAME, REQUIREMENTS_FILENAME,
    },
    env::Environment,
    error::Error,
    git::{self, RemoteRepo},
    util,
};

/// What a source contains. Only code sources carry an execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Production code under test.
    Code,
    /// Test files exercising a code source.
    Tests,
}

impl SourceKind {
    /// Conventional directory name searched for when no path is configured.
    pub fn default_dirname(self) -> &'static str {
        match self {
            Self::Code => DEFAULT_CODE_DIRNAME,
            Self::Tests => DEFAULT_TESTS_DIRNAME,
        }
    }

    /// Human-readable label used in error messages.
    fn label(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Tests => "tests",
        }
    }
}

/// One logical body of files, resolvable from a local path or a remote
/// repository and stageable into a working directory.
#[derive(Debug, Clone)]
pub struct Source {
    /// Code or tests.
    kind:        SourceKind,
    /// The full construction-time configuration.
    config:      SourceConfig,
    /// Resolved origin tree. Known at construction for local sources, and
    /// only after cloning for remote ones.
    src_path:    Option<PathBuf>,
    /// Destination root assigned at staging time.
    working_dir: Option<PathBuf>,
}

impl Source {
    /// Constructs a source, enforcing that exactly one of "the local path
    /// exists" and "a remote URL is set" holds.
    pub fn new(kind: SourceKind, config: SourceConfig) -> Result<Self, Error> {
        let src_path = if config.repo_url.is_some() {
            if let Some(path) = &config.path
                && path.exists()
            {
                return Err(Error::config(format!(
                    "{} source is ambiguous: `{}` exists locally but a repo url is also set",
                    kind.label(),
                    path.display()
                )));
            }
            // repository-relative; resolved after cloning
            None
        } else {
            Some(resolve_local(kind, config.path.as_deref(), None)?)
        };

        Ok(Self {
            kind,
            config,
            src_path,
            working_dir: None,
        })
    }

    /// The source's kind.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// True when this source is instructor-provided reference material.
    pub fn is_reference(&self) -> bool {
        self.config.reference
    }

    /// True when the source is backed by a remote repository.
    pub fn is_remote(&self) -> bool {
        self.config.repo_url.is_some()
    }

    /// The remote repository reference, for remote sources.
    pub fn remote(&self) -> Option<RemoteRepo> {
        self.config
            .repo_url
            .as_ref()
            .map(|url| RemoteRepo::with_branch(url.clone(), self.config.repo_branch.clone()))
    }

    /// The resolved origin tree, if resolution has happened.
    pub fn src_path(&self) -> Option<&Path> {
        self.src_path.as_deref()
    }

    /// The working directory assigned at staging time.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Assigns the working directory without staging anything, so staged
    /// state left by a previous run becomes observable.
    pub fn assign_working_dir(&mut self, dir: &Path) {
        self.working_dir = Some(dir.to_path_buf());
    }

    /// Name of the staging subfolder under the working directory.
    ///
    /// Derived from the configured path rather than the resolved one, so the
    /// name is identical before and after a remote source has been cloned.
    fn dest_dirname(&self) -> String {
        if let Some(name) = &self.config.working_dirname {
            return name.clone();
        }
        if self.config.reference {
            return match self.kind {
                SourceKind::Code => MASTER_CODE_DIRNAME.to_string(),
                SourceKind::Tests => MASTER_TESTS_DIRNAME.to_string(),
            };
        }
        self.config
            .path
            .as_deref()
            .and_then(Path::file_name)
            .or_else(|| self.src_path.as_deref().and_then(Path::file_name))
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.kind.default_dirname().to_string())
    }

    /// The staged copy's path. Undefined until a working directory has been
    /// assigned.
    pub fn staged_path(&self) -> Option<PathBuf> {
        self.working_dir
            .as_ref()
            .map(|dir| dir.join(self.dest_dirname()))
    }

    /// True when the staged copy exists on disk.
    pub fn is_staged(&self) -> bool {
        self.staged_path().is_some_and(|p| p.exists())
    }

    /// Directory the remote clone is kept in.
    fn clone_dir(&self) -> Option<PathBuf> {
        self.working_dir
            .as_ref()
            .map(|dir| dir.join(&self.config.clone_dirname))
    }

    /// Stages this source under `destination`.
    ///
    /// Remote sources are materialized first: an existing clone is reused
    /// (checkout + pull) rather than re-cloned, and clone failures propagate.
    /// The resolved tree is then merge-copied into
    /// `destination/<dest_dirname>`: pre-existing unrelated files survive,
    /// conflicting files are overwritten. With `overwrite`, any previously
    /// staged copy is deleted first.
    pub async fn stage(&mut self, destination: &Path, overwrite: bool) -> Result<PathBuf> {
        self.working_dir = Some(destination.to_path_buf());
        std::fs::create_dir_all(destination)
            .with_context(|| format!("Could not create {}", destination.display()))?;

        if let Some(repo) = self.remote() {
            let clone_dir = destination.join(&self.config.clone_dirname);
            git::clone_or_update(&repo, &clone_dir).await?;
            self.src_path = Some(resolve_in_clone(
                self.kind,
                self.config.path.as_deref(),
                &clone_dir,
            )?);
        }

        let staged = destination.join(self.dest_dirname());
        if overwrite && staged.exists() {
            info!("overwriting staged copy at {}", staged.display());
            util::remove_tree_forced(&staged)?;
        }

        let src = self
            .src_path
            .as_deref()
            .ok_or_else(|| Error::config(format!("{} source is unresolved", self.kind.label())))?;
        util::copy_tree_merge(src, &staged)?;
        debug!("staged {} into {}", src.display(), staged.display());
        Ok(staged)
    }

    /// The execution environment attached to this source. Only code sources
    /// with an assigned working directory have one.
    pub fn environment(&self) -> Option<Environment> {
        if self.kind != SourceKind::Code {
            return None;
        }
        let working_dir = self.working_dir.as_deref()?;
        let dirname = self.config.venv_dirname.as_deref().unwrap_or(if self.config.reference {
            MASTER_VENV_DIRNAME
        } else {
            DEFAULT_VENV_DIRNAME
        });
        Some(Environment::new(working_dir, dirname))
    }

    /// Locates the dependency manifest for this code source: the explicitly
    /// configured path, a manifest inside the origin tree, or one found in
    /// the origin's parent tree.
    pub fn find_requirements(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.requirements_path {
            return Some(path.clone());
        }
        let src = self.src_path.as_deref()?;
        util::find_file_named(REQUIREMENTS_FILENAME, src)
            .or_else(|| util::find_file_named(REQUIREMENTS_FILENAME, src.parent()?))
    }

    /// Provisions the execution environment and installs the manifest, the
    /// `baseline` packages, and the configured extra requirements into it. A
    /// no-op for test sources.
    pub async fn provision(&self, baseline: &[&str]) -> Result<()> {
        let Some(env) = self.environment() else {
            return Ok(());
        };
        env.provision().await?;
        let manifest = self.find_requirements();
        let mut extras: Vec<String> = baseline.iter().map(ToString::to_string).collect();
        extras.extend(self.config.extra_requirements.iter().cloned());
        env.install(manifest.as_deref(), &extras).await?;
        Ok(())
    }

    /// Renames every staged `test_*.py` file by appending `suffix` to its
    /// stem, so reference tests cannot shadow student tests sharing the same
    /// staging root. A rename whose target already exists is a configuration
    /// error.
    pub fn rename_test_files(&self, suffix: &str) -> Result<()> {
        let staged = self
            .staged_path()
            .filter(|p| p.exists())
            .ok_or_else(|| Error::config("cannot rename test files before staging"))?;

        let pattern = staged.join("**").join("test_*.py");
        let pattern = pattern
            .to_str()
            .context("Could not convert staged path to string")?;

        let files: Vec<PathBuf> = glob(pattern)
            .context("Could not create glob")?
            .filter_map(std::result::Result::ok)
            .filter(|p| p.is_file())
            .collect();

        let mut renames = Vec::with_capacity(files.len());
        for file in files {
            let stem = file
                .file_stem()
                .context("test file has no stem")?
                .to_string_lossy()
                .into_owned();
            // already renamed by a previous run
            if stem.ends_with(suffix) {
                continue;
            }
            let target = file.with_file_name(format!("{stem}{suffix}.py"));
            if target.exists() {
                return Err(Error::config(format!(
                    "renaming {} would collide with existing {}",
                    file.display(),
                    target.display()
                ))
                .into());
            }
            renames.push((file, target));
        }

        for (from, to) in renames {
            std::fs::rename(&from, &to).with_context(|| {
                format!("Could not rename {} to {}", from.display(), to.display())
            })?;
        }
        Ok(())
    }

    /// Removes the staged copy, the clone checkout, and the environment.
    ///
    /// Missing paths are tolerated everywhere. A clone that cannot be removed
    /// (open handles, permissions) is logged and left behind rather than
    /// failing the teardown.
    pub fn teardown(&self) -> Result<()> {
        if let Some(staged) = self.staged_path() {
            util::remove_tree_forced(&staged)?;
        }
        if let Some(clone_dir) = self.clone_dir()
            && let Err(err) = util::remove_tree_forced(&clone_dir)
        {
            warn!(
                "could not remove clone at {}; remove it manually: {err:#}",
                clone_dir.display()
            );
        }
        if let Some(env) = self.environment() {
            env.remove()?;
        }
        Ok(())
    }
}

/// Resolves a local source tree: the explicit path when given, otherwise the
/// kind's default directory name searched for under `root` (the current
/// directory when absent).
fn resolve_local(
    kind: SourceKind,
    path: Option<&Path>,
    root: Option<&Path>,
) -> Result<PathBuf, Error> {
    if let Some(path) = path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::config(format!(
            "{} source `{}` does not exist locally and no repo url was provided",
            kind.label(),
            path.display()
        )));
    }

    let root = root
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    util::find_dir_named(kind.default_dirname(), &root).ok_or_else(|| {
        Error::config(format!(
            "could not find a default `{}` directory for the {} source under {}",
            kind.default_dirname(),
            kind.label(),
            root.display()
        ))
    })
}

/// Resolves the source tree inside a fresh clone: the configured
/// repository-relative path, or a search for the kind's default directory
/// name.
fn resolve_in_clone(
    kind: SourceKind,
    path: Option<&Path>,
    clone_dir: &Path,
) -> Result<PathBuf, Error> {
    match path {
        Some(path) => {
            let candidate = clone_dir.join(path);
            if candidate.exists() {
                Ok(candidate)
            } else {
                Err(Error::config(format!(
                    "{} source `{}` does not exist inside the cloned repository",
                    kind.label(),
                    path.display()
                )))
            }
        }
        None => resolve_local(kind, None, Some(clone_dir)),
    }
}
