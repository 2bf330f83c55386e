#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The orchestration engine.
//!
//! A [`Tester`] sequences the whole grading run: stage every configured
//! source, provision the code environments, invoke the test engine against
//! the student's (tests, code) pair, collect and score the result files,
//! optionally repeat against the instructor's reference tests, and persist
//! the weighted report. The pipeline is strictly sequential; each step
//! consumes files the previous one produced.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use bon::Builder;
use tracing::{debug, info, warn};

use crate::{
    config::{RunOptions, Weights},
    constants::{
        BASELINE_REQUIREMENTS, BYTECODE_EXTENSION, CACHE_DIRNAMES, CODE_COVERAGE_KEY,
        DEFAULT_REPORT_FILENAME, DOT_JSON_REPORT_NAME, MASTER_DOT_JSON_REPORT_NAME,
        MASTER_PERCENT_PASSED_KEY, MASTER_TESTS_SUFFIX, PERCENT_PASSED_KEY, PUSH_CLONE_DIRNAME,
        STYLE_KEY,
    },
    git::{self, RemoteRepo},
    process,
    report::{Report, RescaleParams},
    results::{ResultCollector, TestRunSummary},
    source::Source,
    style,
};

/// Construction-time options for a [`Tester`].
#[derive(Builder)]
pub struct TesterConfig {
    /// Instructor reference code, enabling the master comparison pass.
    pub master_code:     Option<Source>,
    /// Instructor reference tests, enabling the master comparison pass.
    pub master_tests:    Option<Source>,
    /// Working/report directory. Defaults to `report_dir` under the current
    /// directory.
    #[builder(into)]
    pub report_dir:      Option<PathBuf>,
    /// File name of the persisted report inside the report directory.
    #[builder(default = DEFAULT_REPORT_FILENAME.to_string(), into)]
    pub report_filename: String,
    /// Per-metric weight overrides.
    #[builder(default)]
    pub weights:         Weights,
    /// Grade rescaling parameters for the produced report.
    #[builder(default)]
    pub rescale:         RescaleParams,
}

/// Orchestrates one grading run over a set of staged sources.
pub struct Tester {
    /// The student's code.
    code:            Source,
    /// The student's tests.
    tests:           Source,
    /// Instructor reference code, if supplied.
    master_code:     Option<Source>,
    /// Instructor reference tests, if supplied.
    master_tests:    Option<Source>,
    /// Working directory every source is staged under; also where result
    /// files and the report land.
    report_dir:      PathBuf,
    /// Full path of the persisted report.
    report_filepath: PathBuf,
    /// Per-metric weights.
    weights:         Weights,
    /// The accumulating report.
    report:          Report,
    /// Summary of the student test pass, once executed.
    student_summary: Option<TestRunSummary>,
    /// Summary of the reference test pass, once executed.
    master_summary:  Option<TestRunSummary>,
}

impl Tester {
    /// Creates a tester over the student's code and tests.
    pub fn new(code: Source, tests: Source, config: TesterConfig) -> Self {
        let report_dir = config.report_dir.unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("report_dir")
        });
        let report_filepath = report_dir.join(&config.report_filename);
        let report = Report::builder()
            .report_filepath(report_filepath.clone())
            .params(config.rescale)
            .build();

        let mut tester = Self {
            code,
            tests,
            master_code: config.master_code,
            master_tests: config.master_tests,
            report_dir,
            report_filepath,
            weights: config.weights,
            report,
            student_summary: None,
            master_summary: None,
        };
        let working_dir = tester.report_dir.clone();
        for source in tester.sources_mut() {
            source.assign_working_dir(&working_dir);
        }
        tester
    }

    /// The accumulated report.
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Where the report is persisted.
    pub fn report_filepath(&self) -> &Path {
        &self.report_filepath
    }

    /// The working/report directory.
    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Summary of the student test pass, if it has run.
    pub fn student_summary(&self) -> Option<TestRunSummary> {
        self.student_summary
    }

    /// Summary of the reference test pass, if it has run.
    pub fn master_summary(&self) -> Option<TestRunSummary> {
        self.master_summary
    }

    /// Every configured source.
    fn sources(&self) -> impl Iterator<Item = &Source> {
        [Some(&self.code), Some(&self.tests)]
            .into_iter()
            .flatten()
            .chain(self.master_code.as_ref())
            .chain(self.master_tests.as_ref())
    }

    /// Every configured source, mutably.
    fn sources_mut(&mut self) -> impl Iterator<Item = &mut Source> {
        [Some(&mut self.code), Some(&mut self.tests)]
            .into_iter()
            .flatten()
            .chain(self.master_code.as_mut())
            .chain(self.master_tests.as_mut())
    }

    /// True when every configured source is already staged.
    pub fn is_staged(&self) -> bool {
        self.sources().all(Source::is_staged)
    }

    /// The collector for this run's result artifacts. The engine executes
    /// from the report directory, so both search roots coincide there plus
    /// the process's own working directory as a fallback.
    fn collector(&self) -> ResultCollector {
        let exec_root = std::env::current_dir().unwrap_or_else(|_| self.report_dir.clone());
        ResultCollector::new(self.report_dir.clone(), exec_root)
    }

    /// Runs the full pipeline and returns the finished report.
    pub async fn run(&mut self, opts: &RunOptions) -> Result<&Report> {
        self.stage_all(opts).await?;
        self.provision_all().await?;
        self.run_student_pass().await?;
        self.run_master_pass().await?;

        if opts.save_report {
            self.report.save(Some(&self.report_filepath.clone()))?;
            info!("report saved to {}", self.report_filepath.display());
        }
        if opts.clear_result_files {
            self.collector().clear_artifacts()?;
            self.clear_caches();
        }
        if opts.clear_staged {
            self.teardown()?;
        }

        Ok(&self.report)
    }

    /// Stages every configured source under the report directory. Skipped
    /// entirely when everything is already staged and no forced re-setup was
    /// requested.
    async fn stage_all(&mut self, opts: &RunOptions) -> Result<()> {
        if self.is_staged() && !opts.force_setup {
            debug!("all sources already staged; skipping setup");
            return Ok(());
        }
        let destination = self.report_dir.clone();
        let overwrite = opts.overwrite;
        for source in self.sources_mut() {
            source.stage(&destination, overwrite).await?;
        }
        Ok(())
    }

    /// Provisions an execution environment for each code source. Test-only
    /// sources have no provisioning step.
    async fn provision_all(&mut self) -> Result<()> {
        self.code.provision(BASELINE_REQUIREMENTS).await?;
        if let Some(master_code) = &self.master_code {
            master_code.provision(BASELINE_REQUIREMENTS).await?;
        }
        Ok(())
    }

    /// Builds the engine's argument list for one invocation.
    fn engine_args(
        &self,
        code_dir: Option<&Path>,
        report_name: &str,
        tests_dir: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(code_dir) = code_dir {
            let mut cov = OsString::from("--cov=");
            cov.push(code_dir);
            args.push(cov);
            args.push("--cov-report=json".into());
        }
        args.push("-p".into());
        args.push("no:cacheprovider".into());
        args.push("--json-report".into());
        args.push(format!("--json-report-file={report_name}").into());
        args.push("--json-report-summary".into());
        args.push("--json-report-indent=4".into());
        args.push(tests_dir.as_os_str().to_os_string());
        args
    }

    /// Runs the student's tests against the student's code and folds
    /// coverage, pass-rate, and style metrics into the report.
    async fn run_student_pass(&mut self) -> Result<()> {
        let code_dir = self
            .code
            .staged_path()
            .context("code source is not staged")?;
        let tests_dir = self
            .tests
            .staged_path()
            .context("tests source is not staged")?;
        let env = self
            .code
            .environment()
            .context("code source has no environment")?;

        self.clear_caches();
        let args = self.engine_args(Some(&code_dir), DOT_JSON_REPORT_NAME, &tests_dir);
        info!("running test engine against {}", tests_dir.display());
        let collected =
            process::run_collect(env.executable("pytest"), &args, Some(&self.report_dir), None)
                .await?;
        if !collected.status.success() {
            // failing tests are a scorable outcome, not a pipeline failure
            debug!("test engine exited non-zero");
        }
        self.clear_caches();

        let collector = self.collector();
        collector.gather()?;

        let coverage = collector.coverage_percent(&code_dir);
        self.report
            .add(CODE_COVERAGE_KEY, coverage, self.weights.get(CODE_COVERAGE_KEY));

        let summary = collector.test_summary(DOT_JSON_REPORT_NAME)?;
        self.student_summary = Some(summary);
        self.report.add(
            PERCENT_PASSED_KEY,
            summary.percent_passed,
            self.weights.get(PERCENT_PASSED_KEY),
        );

        let style_score = self.style_metric(&env.executable("pycodestyle")).await?;
        self.report
            .add(STYLE_KEY, style_score, self.weights.get(STYLE_KEY));

        Ok(())
    }

    /// Mean style score over the staged code and tests trees.
    async fn style_metric(&self, checker: &Path) -> Result<f64> {
        let code_dir = self
            .code
            .staged_path()
            .context("code source is not staged")?;
        let tests_dir = self
            .tests
            .staged_path()
            .context("tests source is not staged")?;

        let code_outcome = style::check_dir(checker, &code_dir).await?;
        let tests_outcome = style::check_dir(checker, &tests_dir).await?;
        Ok((code_outcome.score() + tests_outcome.score()) / 2.0)
    }

    /// Runs the student's code against the instructor's reference tests, when
    /// both reference sources were supplied. Absence of either skips the pass
    /// entirely. No coverage is requested for this pass.
    async fn run_master_pass(&mut self) -> Result<()> {
        let (Some(master_code), Some(master_tests)) =
            (self.master_code.as_ref(), self.master_tests.as_ref())
        else {
            debug!("reference sources absent; skipping master pass");
            return Ok(());
        };

        master_tests.rename_test_files(MASTER_TESTS_SUFFIX)?;
        let tests_dir = master_tests
            .staged_path()
            .context("reference tests are not staged")?;
        let env = master_code
            .environment()
            .context("reference code has no environment")?;

        let args = self.engine_args(None, MASTER_DOT_JSON_REPORT_NAME, &tests_dir);
        info!("running reference tests from {}", tests_dir.display());
        let collected =
            process::run_collect(env.executable("pytest"), &args, Some(&self.report_dir), None)
                .await?;
        if !collected.status.success() {
            debug!("reference test run exited non-zero");
        }
        self.clear_caches();

        let collector = self.collector();
        collector.gather()?;
        let summary = collector.test_summary(MASTER_DOT_JSON_REPORT_NAME)?;
        self.master_summary = Some(summary);
        self.report.add(
            MASTER_PERCENT_PASSED_KEY,
            summary.percent_passed,
            self.weights.get(MASTER_PERCENT_PASSED_KEY),
        );

        Ok(())
    }

    /// Removes cache directories and compiled artifacts from the working
    /// area.
    fn clear_caches(&self) {
        crate::util::remove_dirs_named(&self.report_dir, CACHE_DIRNAMES);
        crate::util::remove_files_with_extension(&self.report_dir, BYTECODE_EXTENSION);
    }

    /// Pushes the saved report to a repository.
    ///
    /// `None` or `"auto"` detects the URL from the code source's working
    /// directory. Push failures are logged, never raised; pushing is a
    /// non-critical side effect of a completed run.
    pub async fn push_report_to(&mut self, target: Option<&str>) -> Result<()> {
        let url = match target {
            Some("auto") | None => {
                let dir = self
                    .code
                    .working_dir()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.report_dir.clone());
                git::detect_remote_url(&dir).await
            }
            Some(url) => Some(url.to_string()),
        };
        let Some(url) = url else {
            warn!("could not detect a repository to push the report to");
            return Ok(());
        };

        self.report.save(Some(&self.report_filepath.clone()))?;
        let scratch = self.report_dir.join(PUSH_CLONE_DIRNAME);
        if let Err(err) = git::push_file(&self.report_filepath, &RemoteRepo::new(url), &scratch)
            .await
        {
            warn!("could not push report: {err:#}");
        }
        Ok(())
    }

    /// Removes temporary result files, caches, staged trees, clones, and
    /// environments. Safe to skip; artifacts stay inspectable when it is.
    pub fn teardown(&self) -> Result<()> {
        self.collector().clear_artifacts()?;
        self.clear_caches();
        for source in self.sources() {
            source.teardown()?;
        }
        Ok(())
    }
}
