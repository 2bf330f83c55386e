#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The error taxonomy of the grading pipeline.
//!
//! Only failures a caller must be able to tell apart get a variant here:
//! everything else travels as a plain [`anyhow::Error`]. Soft failures of the
//! external engines (failing tests, unparsable coverage, style violations)
//! never surface as errors at all; they become low metric values.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal error categories raised by the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller's configuration cannot describe a gradeable run: a source
    /// path that does not exist and has no remote URL, a reference test file
    /// whose renamed form would collide, and similar.
    #[error("configuration error: {0}")]
    Config(String),

    /// An expected machine-readable result file was not produced or could not
    /// be located after an engine invocation.
    #[error("expected result file `{}` was not produced", .0.display())]
    MissingArtifact(PathBuf),
}

impl Error {
    /// Convenience constructor for configuration errors.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
