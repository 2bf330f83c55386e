#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Isolated execution environments for staged code trees.
//!
//! Each code source gets a dedicated virtual environment under the working
//! directory. Provisioning is deliberately not idempotent: an existing
//! environment is destroyed and rebuilt so every run starts from a fresh
//! dependency set. Once provisioned, engine invocations route through the
//! environment's own executables rather than the ambient ones.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use which::which;

use crate::{process, util};

/// Finds the ambient Python interpreter used to create environments.
fn ambient_python() -> Result<PathBuf> {
    which("python3")
        .or_else(|_| which("python"))
        .context("Cannot find a Python interpreter on path (python3 or python)")
}

/// A virtual environment rooted under a working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Root directory of the virtual environment.
    venv_dir: PathBuf,
}

impl Environment {
    /// Describes the environment named `dirname` under `working_dir`. Nothing
    /// is created until [`Environment::provision`] runs.
    pub fn new(working_dir: &Path, dirname: &str) -> Self {
        Self {
            venv_dir: working_dir.join(dirname),
        }
    }

    /// Root directory of the environment.
    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }

    /// True when the environment exists on disk.
    pub fn exists(&self) -> bool {
        self.venv_dir.exists()
    }

    /// The environment's executables directory (`bin` or `Scripts`).
    pub fn scripts_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir.join("Scripts")
        } else {
            self.venv_dir.join("bin")
        }
    }

    /// Path of an executable inside the environment. Valid once provisioned;
    /// using it routes the invocation through this environment instead of the
    /// ambient installation.
    pub fn executable(&self, name: &str) -> PathBuf {
        self.scripts_dir().join(name)
    }

    /// The environment's Python interpreter.
    pub fn python(&self) -> PathBuf {
        self.executable("python")
    }

    /// Creates the environment, destroying any previous one at the same path
    /// first. Returns the combined creation transcript.
    pub async fn provision(&self) -> Result<String> {
        if self.exists() {
            info!("recreating environment at {}", self.venv_dir.display());
            util::remove_tree_forced(&self.venv_dir)?;
        } else {
            info!("creating environment at {}", self.venv_dir.display());
        }

        let python = ambient_python()?;
        let collected = process::run_collect(
            &python,
            &["-m".as_ref(), "venv".as_ref(), self.venv_dir.as_os_str()],
            None,
            None,
        )
        .await?;
        if !collected.status.success() {
            bail!(
                "could not create environment at {}: {}",
                self.venv_dir.display(),
                collected.combined_lossy().trim()
            );
        }

        debug!("environment created at {}", self.venv_dir.display());
        Ok(collected.combined_lossy())
    }

    /// Installs the manifest's dependencies (when a manifest exists) followed
    /// by each extra requirement, using the environment's own pip. Returns
    /// the combined install transcript.
    ///
    /// A missing manifest makes the manifest step a no-op, not an error; a
    /// submission with no declared dependencies is perfectly gradeable.
    pub async fn install(&self, manifest: Option<&Path>, extras: &[String]) -> Result<String> {
        let python = self.python();
        let mut transcript = String::new();

        match manifest {
            Some(manifest) => {
                info!("installing requirements from {}", manifest.display());
                let collected = process::run_collect(
                    &python,
                    &[
                        "-m".as_ref(),
                        "pip".as_ref(),
                        "install".as_ref(),
                        "-r".as_ref(),
                        manifest.as_os_str(),
                    ],
                    None,
                    None,
                )
                .await?;
                if !collected.status.success() {
                    bail!(
                        "could not install requirements from {}: {}",
                        manifest.display(),
                        collected.combined_lossy().trim()
                    );
                }
                transcript.push_str(&collected.combined_lossy());
            }
            None => debug!("no dependency manifest found; skipping manifest install"),
        }

        for extra in extras {
            debug!("installing extra requirement {extra}");
            let collected = process::run_collect(
                &python,
                &["-m", "pip", "install", extra.as_str()],
                None,
                None,
            )
            .await?;
            if !collected.status.success() {
                bail!(
                    "could not install extra requirement {extra}: {}",
                    collected.combined_lossy().trim()
                );
            }
            transcript.push_str(&collected.combined_lossy());
        }

        Ok(transcript)
    }

    /// Removes the environment from disk. Missing environments are fine.
    pub fn remove(&self) -> Result<()> {
        util::remove_tree_forced(&self.venv_dir)
    }
}
