#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Locating, normalizing, and parsing the result files the test engine
//! leaves behind.
//!
//! The engine is a black box; the only contract is on disk: a JSON report
//! with a `summary` object of integer `passed`/`failed`/`total` counts, and a
//! JSON coverage file mapping file paths to `summary.percent_covered`
//! percentages.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    constants::{
        COVERAGE_JSON_NAME, DOT_COVERAGE_NAME, DOT_JSON_REPORT_NAME, MASTER_DOT_JSON_REPORT_NAME,
        ZERO_TESTS_PASS_RATIO,
    },
    error::Error,
    util,
};

/// Summary of one test-engine invocation, derived from the raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestRunSummary {
    /// Number of passing tests.
    pub passed:         u64,
    /// Number of failing tests.
    pub failed:         u64,
    /// Total number of tests collected.
    pub total:          u64,
    /// `passed / total`, or the zero-tests policy ratio when `total == 0`.
    pub ratio_passed:   f64,
    /// Complement of `ratio_passed`.
    pub ratio_failed:   f64,
    /// `100 * ratio_passed`.
    pub percent_passed: f64,
    /// `100 * ratio_failed`.
    pub percent_failed: f64,
}

impl TestRunSummary {
    /// Derives a summary from raw counts. A suite with zero tests takes the
    /// configured default ratio instead of dividing by zero.
    pub fn from_counts(passed: u64, failed: u64, total: u64) -> Self {
        let ratio_passed = if total > 0 {
            passed as f64 / total as f64
        } else {
            ZERO_TESTS_PASS_RATIO
        };
        let ratio_failed = if total > 0 {
            failed as f64 / total as f64
        } else {
            1.0 - ZERO_TESTS_PASS_RATIO
        };
        Self {
            passed,
            failed,
            total,
            ratio_passed,
            ratio_failed,
            percent_passed: 100.0 * ratio_passed,
            percent_failed: 100.0 * ratio_failed,
        }
    }
}

/// `summary` object of the engine's JSON report. Counts the engine omits
/// (no failures, say) default to zero.
#[derive(Debug, Default, Deserialize)]
struct EngineSummary {
    /// Number of passing tests.
    #[serde(default)]
    passed: u64,
    /// Number of failing tests.
    #[serde(default)]
    failed: u64,
    /// Total number of tests collected.
    #[serde(default)]
    total:  u64,
}

/// Top level of the engine's JSON report file.
#[derive(Debug, Deserialize)]
struct EngineReport {
    /// The pass/fail summary.
    summary: EngineSummary,
}

/// Per-file summary inside the coverage report.
#[derive(Debug, Deserialize)]
struct CoverageFileSummary {
    /// Percent of the file covered by the test run.
    percent_covered: f64,
}

/// One file entry of the coverage report.
#[derive(Debug, Deserialize)]
struct CoverageFile {
    /// The file's coverage summary.
    summary: CoverageFileSummary,
}

/// Top level of the coverage JSON report.
#[derive(Debug, Deserialize)]
struct CoverageReport {
    /// Mapping from file path to its coverage entry.
    files: BTreeMap<String, CoverageFile>,
}

/// Locates, normalizes, and parses the temporary result artifacts of an
/// invocation.
#[derive(Debug, Clone)]
pub struct ResultCollector {
    /// Directory result files are moved into and reports are written to.
    report_dir: PathBuf,
    /// Directory the engine was executed from; artifacts may land here.
    exec_root:  PathBuf,
}

impl ResultCollector {
    /// File names this collector knows how to gather.
    const ARTIFACT_NAMES: &'static [&'static str] = &[
        DOT_COVERAGE_NAME,
        COVERAGE_JSON_NAME,
        DOT_JSON_REPORT_NAME,
        MASTER_DOT_JSON_REPORT_NAME,
    ];

    /// Creates a collector for the given report directory and execution root.
    pub fn new(report_dir: impl Into<PathBuf>, exec_root: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            exec_root:  exec_root.into(),
        }
    }

    /// Searches the report directory, then the execution root, for a result
    /// file with the given name.
    pub fn locate(&self, filename: &str) -> Option<PathBuf> {
        for root in [&self.report_dir, &self.exec_root] {
            if let Some(found) = util::find_file_named(filename, root) {
                return Some(found);
            }
        }
        None
    }

    /// Every known temporary artifact currently present on disk.
    pub fn present_artifacts(&self) -> Vec<PathBuf> {
        Self::ARTIFACT_NAMES
            .iter()
            .filter_map(|name| self.locate(name))
            .collect()
    }

    /// Moves every known artifact into the report directory, reindenting the
    /// JSON ones along the way. Artifacts already in place stay put.
    pub fn gather(&self) -> Result<()> {
        fs::create_dir_all(&self.report_dir)
            .with_context(|| format!("Could not create {}", self.report_dir.display()))?;

        for found in self.present_artifacts() {
            if found.extension().and_then(|e| e.to_str()) == Some("json")
                && let Err(err) = util::reindent_json_file(&found)
            {
                debug!("could not reindent {}: {err:#}", found.display());
            }

            let target = self.report_dir.join(found.file_name().unwrap_or_default());
            if target == found {
                continue;
            }
            util::remove_file_forced(&target)?;
            fs::rename(&found, &target).or_else(|_| {
                // rename fails across filesystems; fall back to copy+remove
                fs::copy(&found, &target)
                    .map(|_| ())
                    .and_then(|()| fs::remove_file(&found))
                    .with_context(|| {
                        format!("Could not move {} to {}", found.display(), target.display())
                    })
            })?;
        }

        Ok(())
    }

    /// Parses the pass/fail summary from the named engine report.
    ///
    /// A missing or corrupt file is fatal here: by the time this is called
    /// the invocation has finished, so absence means the engine never wrote
    /// its report and nothing scorable exists.
    pub fn test_summary(&self, report_name: &str) -> Result<TestRunSummary> {
        let path = self
            .locate(report_name)
            .ok_or_else(|| Error::MissingArtifact(self.report_dir.join(report_name)))?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let report: EngineReport = serde_json::from_str(&raw)
            .map_err(|_| Error::MissingArtifact(path.clone()))
            .context("engine report did not match the expected summary shape")?;

        Ok(TestRunSummary::from_counts(
            report.summary.passed,
            report.summary.failed,
            report.summary.total,
        ))
    }

    /// Resolves a coverage-report file key to an absolute path. The engine
    /// runs from the report directory, so relative keys are relative to it
    /// (or to the execution root when the artifact landed there).
    fn resolve_coverage_key(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let under_report_dir = self.report_dir.join(path);
        if under_report_dir.exists() {
            return under_report_dir;
        }
        let under_exec_root = self.exec_root.join(path);
        if under_exec_root.exists() {
            return under_exec_root;
        }
        under_report_dir
    }

    /// Mean per-file coverage percentage across every file of the coverage
    /// report that lies under `code_dir`.
    ///
    /// An absent or unparsable coverage file is a soft failure: it is logged
    /// and scored as 0% so grading always completes.
    pub fn coverage_percent(&self, code_dir: &Path) -> f64 {
        let Some(path) = self.locate(COVERAGE_JSON_NAME) else {
            warn!("no coverage report found; scoring coverage as 0%");
            return 0.0;
        };

        let report: CoverageReport = match fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from))
        {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    "could not parse coverage report {}: {err:#}; scoring coverage as 0%",
                    path.display()
                );
                return 0.0;
            }
        };

        let percents: Vec<f64> = report
            .files
            .iter()
            .filter(|(file, _)| {
                file.ends_with(".py")
                    && util::is_subpath(code_dir, &self.resolve_coverage_key(file))
            })
            .map(|(_, entry)| entry.summary.percent_covered)
            .collect();

        if percents.is_empty() {
            warn!(
                "coverage report lists no files under {}; scoring coverage as 0%",
                code_dir.display()
            );
            return 0.0;
        }

        percents.iter().sum::<f64>() / percents.len() as f64
    }

    /// Deletes every known temporary artifact.
    pub fn clear_artifacts(&self) -> Result<()> {
        for found in self.present_artifacts() {
            util::remove_file_forced(&found)?;
        }
        Ok(())
    }
}
