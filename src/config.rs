#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Explicit configuration structures for the pipeline.
//!
//! Every recognized option is a named field with a documented default;
//! unknown options are unrepresentable by construction. Logging is not
//! configured here at all: library code emits `tracing` events and the
//! embedding application chooses the subscriber.

use std::{collections::BTreeMap, path::PathBuf};

use bon::Builder;

use crate::{
    constants::{CLONE_DIRNAME, DEFAULT_REPO_BRANCH, METRIC_KEYS},
    error::Error,
};

/// Configuration of a single source of files (code or tests).
///
/// A source is *remote* iff `repo_url` is set; `path` then names the tree
/// inside the repository (or is searched for after cloning). For local
/// sources `path` must exist on disk at construction.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct SourceConfig {
    /// Path to the source tree, local or repository-relative. When absent,
    /// the kind's default directory name is searched for.
    #[builder(into)]
    pub path: Option<PathBuf>,

    /// Remote repository URL. Setting this makes the source remote.
    pub repo_url: Option<String>,

    /// Branch checked out for remote sources.
    #[builder(default = DEFAULT_REPO_BRANCH.to_string())]
    pub repo_branch: String,

    /// Name of the staging subfolder under the working directory. Defaults to
    /// the source path's base name, or the kind's conventional name.
    pub working_dirname: Option<String>,

    /// Directory name the remote clone is kept in, under the working
    /// directory. An existing clone there is reused, never re-cloned.
    #[builder(default = CLONE_DIRNAME.to_string())]
    pub clone_dirname: String,

    /// Marks this source as instructor-provided reference material.
    #[builder(default)]
    pub reference: bool,

    /// Virtual-environment directory name, for code sources. Defaults by
    /// kind and reference flag.
    pub venv_dirname: Option<String>,

    /// Explicit dependency manifest path. When absent the manifest is
    /// located by searching around the staged tree.
    #[builder(into)]
    pub requirements_path: Option<PathBuf>,

    /// Extra dependency specs installed after the manifest.
    #[builder(default)]
    pub extra_requirements: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Per-metric weight table. Absent keys default to a weight of one.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights(BTreeMap<String, f64>);

impl Default for Weights {
    fn default() -> Self {
        Self(
            METRIC_KEYS
                .iter()
                .map(|key| (key.to_string(), 1.0))
                .collect(),
        )
    }
}

impl Weights {
    /// The weight for `key`, defaulting to `1.0` for unknown keys.
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(1.0)
    }

    /// Overrides the weight for `key`. Negative weights are rejected.
    pub fn set(&mut self, key: impl Into<String>, weight: f64) -> Result<&mut Self, Error> {
        if weight < 0.0 {
            return Err(Error::config(format!(
                "weight for `{}` must be non-negative, got {weight}",
                key.into()
            )));
        }
        self.0.insert(key.into(), weight);
        Ok(self)
    }

    /// Applies every `(key, weight)` override in `overrides`.
    pub fn merge(
        &mut self,
        overrides: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<&mut Self, Error> {
        for (key, weight) in overrides {
            self.set(key, weight)?;
        }
        Ok(self)
    }
}

/// Caller-controlled switches for a single orchestration run.
#[derive(Debug, Clone, Builder)]
pub struct RunOptions {
    /// Persist the report to disk once grading completes.
    #[builder(default = true)]
    pub save_report: bool,

    /// Re-stage sources even when every source is already staged.
    #[builder(default)]
    pub force_setup: bool,

    /// Delete previously staged copies before copying sources in.
    #[builder(default)]
    pub overwrite: bool,

    /// Remove temporary engine result files after the report is built.
    #[builder(default)]
    pub clear_result_files: bool,

    /// Remove staged trees, clones, and environments after the run. Off by
    /// default so artifacts stay inspectable.
    #[builder(default)]
    pub clear_staged: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
