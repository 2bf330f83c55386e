#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Style compliance scoring.
//!
//! The style checker is an external engine invoked against a directory; all
//! this module consumes is its numeric contract: a total error count, the
//! number of physical source lines, and the set of distinct message codes.
//! The score is `clip(100 - 100 * errors / physical_lines, 0, 100)`, with an
//! empty directory scoring a clean 100.

use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    constants::{STYLE_IGNORE, STYLE_MAX_LINE_LENGTH},
    process, util,
};

/// What one style-checker invocation found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOutcome {
    /// Total number of reported violations.
    pub error_count:    u64,
    /// Total physical lines across the checked files.
    pub physical_lines: u64,
    /// Distinct violation codes encountered (`E302`, `W605`, ...).
    pub distinct_codes: BTreeSet<String>,
}

impl StyleOutcome {
    /// The outcome's compliance score.
    pub fn score(&self) -> f64 {
        style_score(self.error_count, self.physical_lines)
    }
}

/// Compliance percentage for an error count over a physical line count.
///
/// Zero physical lines means a zero error ratio, never a division by zero;
/// an error ratio at or above one clips to a score of zero.
pub fn style_score(error_count: u64, physical_lines: u64) -> f64 {
    let error_ratio = if physical_lines == 0 {
        0.0
    } else {
        error_count as f64 / physical_lines as f64
    };
    (100.0 - 100.0 * error_ratio).clamp(0.0, 100.0)
}

/// Parses checker output lines of the form `path:row:col: CODE message`,
/// returning the violation count and the set of distinct codes.
pub fn parse_checker_output(output: &str) -> (u64, BTreeSet<String>) {
    let mut count = 0u64;
    let mut codes = BTreeSet::new();

    for line in output.lines() {
        // The code is the first token after the third colon.
        let mut parts = line.splitn(4, ':');
        let (Some(_), Some(row), Some(col), Some(rest)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if row.trim().parse::<u64>().is_err() || col.trim().parse::<u64>().is_err() {
            continue;
        }
        let Some(code) = rest.trim().split_whitespace().next() else {
            continue;
        };
        count += 1;
        codes.insert(code.to_string());
    }

    (count, codes)
}

/// Counts physical lines across every Python file under `dir`.
pub fn count_physical_lines(dir: &Path) -> Result<u64> {
    let mut lines = 0u64;
    for file in util::find_files("py", 10, dir)? {
        let contents = fs::read_to_string(&file)
            .with_context(|| format!("Could not read {}", file.display()))?;
        lines += contents.lines().count() as u64;
    }
    Ok(lines)
}

/// Runs the style checker at `checker` against `dir` and derives the
/// outcome.
///
/// The checker exiting non-zero is expected whenever violations exist; only
/// a failure to spawn it is an error.
pub async fn check_dir(checker: &Path, dir: &Path) -> Result<StyleOutcome> {
    let max_line = format!("--max-line-length={STYLE_MAX_LINE_LENGTH}");
    let ignore = format!("--ignore={STYLE_IGNORE}");
    let args = [
        max_line.as_str(),
        ignore.as_str(),
        dir.to_str().context("Could not convert dir to string")?,
    ];

    let collected = process::run_collect(checker, &args, None, None).await?;
    let (error_count, distinct_codes) = parse_checker_output(&collected.stdout_lossy());
    let physical_lines = count_physical_lines(dir)?;
    debug!(
        "style check of {}: {error_count} violations over {physical_lines} lines",
        dir.display()
    );

    Ok(StyleOutcome {
        error_count,
        physical_lines,
        distinct_codes,
    })
}
