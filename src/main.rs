#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # autograde
//!
//! Command-line front end for the grading pipeline. Point it at a student's
//! code and tests (local directories or remote repositories), optionally at
//! the instructor's reference code and tests, and it stages everything,
//! provisions environments, runs the test engine, and prints a weighted
//! grade report.

use std::path::PathBuf;

use anyhow::Result;
use autograde::{
    config::{RunOptions, SourceConfig, Weights},
    report::RescaleParams,
    source::{Source, SourceKind},
    tester::{Tester, TesterConfig},
};
use bpaf::*;
use dotenvy::dotenv;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, object::Rows},
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Parsed command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    /// Path to the student's code.
    code:            Option<PathBuf>,
    /// Path to the student's tests.
    tests:           Option<PathBuf>,
    /// Remote repository holding the student's submission.
    repo:            Option<String>,
    /// Branch of the student repository.
    branch:          Option<String>,
    /// Path to the instructor's reference code.
    master_code:     Option<PathBuf>,
    /// Path to the instructor's reference tests.
    master_tests:    Option<PathBuf>,
    /// Remote repository holding the reference material.
    master_repo:     Option<String>,
    /// Branch of the reference repository.
    master_branch:   Option<String>,
    /// Working/report directory.
    report_dir:      Option<PathBuf>,
    /// Explicit dependency manifest for the student's code.
    requirements:    Option<PathBuf>,
    /// Metric weight overrides.
    weights:         Vec<(String, f64)>,
    /// Lower bound of the raw grade domain.
    grade_min:       f64,
    /// Rescaled value at the lower bound.
    grade_min_value: f64,
    /// Upper bound of the grade domain and range.
    grade_max:       f64,
    /// Delete previously staged copies before staging.
    overwrite:       bool,
    /// Re-stage even when everything is already staged.
    force_setup:     bool,
    /// Skip persisting the report.
    no_save:         bool,
    /// Remove temporary result files afterwards.
    clear_results:   bool,
    /// Remove staged trees, clones, and environments afterwards.
    clear_staged:    bool,
    /// Push the report to this repository URL, or `auto` to detect it.
    push_report_to:  Option<String>,
    /// Enable debug-level logging.
    debug:           bool,
}

/// Parse the command line arguments and return an `Args` struct.
fn options() -> Args {
    let code = long("code")
        .help("Path to the student's code (default: a `src` directory)")
        .argument::<PathBuf>("PATH")
        .optional();
    let tests = long("tests")
        .help("Path to the student's tests (default: a `tests` directory)")
        .argument::<PathBuf>("PATH")
        .optional();
    let repo = long("repo")
        .help("Remote repository URL holding the student's submission")
        .argument::<String>("URL")
        .optional();
    let branch = long("branch")
        .help("Branch of the student repository (default: main)")
        .argument::<String>("BRANCH")
        .optional();
    let master_code = long("master-code")
        .help("Path to the instructor's reference code")
        .argument::<PathBuf>("PATH")
        .optional();
    let master_tests = long("master-tests")
        .help("Path to the instructor's reference tests")
        .argument::<PathBuf>("PATH")
        .optional();
    let master_repo = long("master-repo")
        .help("Remote repository URL holding the reference material")
        .argument::<String>("URL")
        .optional();
    let master_branch = long("master-branch")
        .help("Branch of the reference repository (default: main)")
        .argument::<String>("BRANCH")
        .optional();
    let report_dir = long("report-dir")
        .help("Directory sources are staged in and reports are written to")
        .argument::<PathBuf>("PATH")
        .optional();
    let requirements = long("requirements")
        .help("Explicit dependency manifest for the student's code")
        .argument::<PathBuf>("PATH")
        .optional();
    let weights = long("weight")
        .help("Override a metric weight, e.g. --weight style=0.5")
        .argument::<String>("KEY=VALUE")
        .parse(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| String::from("expected KEY=VALUE"))?;
            let value: f64 = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
            Ok::<_, String>((key.to_string(), value))
        })
        .many();
    let grade_min = long("grade-min")
        .help("Lower bound of the raw grade domain")
        .argument::<f64>("N")
        .fallback(0.0);
    let grade_min_value = long("grade-min-value")
        .help("Rescaled grade at the lower bound")
        .argument::<f64>("N")
        .fallback(0.0);
    let grade_max = long("grade-max")
        .help("Upper bound of the grade domain and range")
        .argument::<f64>("N")
        .fallback(100.0);
    let overwrite = long("overwrite")
        .help("Delete previously staged copies before staging")
        .switch();
    let force_setup = long("force-setup")
        .help("Re-stage sources even when everything is already staged")
        .switch();
    let no_save = long("no-save").help("Skip persisting the report").switch();
    let clear_results = long("clear-results")
        .help("Remove temporary result files after the run")
        .switch();
    let clear_staged = long("clear-staged")
        .help("Remove staged trees, clones, and environments after the run")
        .switch();
    let push_report_to = long("push-report-to")
        .help("Push the report to this repository URL, or `auto` to detect it")
        .argument::<String>("URL")
        .optional();
    let debug = long("debug").help("Enable debug-level logging").switch();

    construct!(Args {
        code,
        tests,
        repo,
        branch,
        master_code,
        master_tests,
        master_repo,
        master_branch,
        report_dir,
        requirements,
        weights,
        grade_min,
        grade_min_value,
        grade_max,
        overwrite,
        force_setup,
        no_save,
        clear_results,
        clear_staged,
        push_report_to,
        debug,
    })
    .to_options()
    .descr("Autograder for Python submissions")
    .run()
}

/// One row of the printed metric table.
#[derive(Tabled)]
struct MetricRow {
    /// Metric name.
    #[tabled(rename = "Metric")]
    metric:   String,
    /// Measured value.
    #[tabled(rename = "Value")]
    value:    String,
    /// Weight applied to the value.
    #[tabled(rename = "Weight")]
    weight:   String,
    /// Value times weight.
    #[tabled(rename = "Weighted")]
    weighted: String,
}

/// Builds the sources and tester described by the arguments.
fn build_tester(args: &Args) -> Result<Tester> {
    let code_config = SourceConfig::builder()
        .maybe_path(args.code.clone())
        .maybe_repo_url(args.repo.clone())
        .maybe_repo_branch(args.branch.clone())
        .maybe_requirements_path(args.requirements.clone())
        .build();
    let tests_config = SourceConfig::builder()
        .maybe_path(args.tests.clone())
        .maybe_repo_url(args.repo.clone())
        .maybe_repo_branch(args.branch.clone())
        .build();
    let code = Source::new(SourceKind::Code, code_config)?;
    let tests = Source::new(SourceKind::Tests, tests_config)?;

    let has_master = args.master_code.is_some() || args.master_repo.is_some();
    let (master_code, master_tests) = if has_master {
        let master_code_config = SourceConfig::builder()
            .maybe_path(args.master_code.clone())
            .maybe_repo_url(args.master_repo.clone())
            .maybe_repo_branch(args.master_branch.clone())
            .reference(true)
            .build();
        let master_tests_config = SourceConfig::builder()
            .maybe_path(args.master_tests.clone())
            .maybe_repo_url(args.master_repo.clone())
            .maybe_repo_branch(args.master_branch.clone())
            .reference(true)
            .build();
        (
            Some(Source::new(SourceKind::Code, master_code_config)?),
            Some(Source::new(SourceKind::Tests, master_tests_config)?),
        )
    } else {
        (None, None)
    };

    let mut weights = Weights::default();
    weights.merge(args.weights.iter().cloned())?;

    let rescale = RescaleParams {
        grade_min:       args.grade_min,
        grade_min_value: args.grade_min_value,
        grade_max:       args.grade_max,
    };

    let config = TesterConfig::builder()
        .maybe_master_code(master_code)
        .maybe_master_tests(master_tests)
        .maybe_report_dir(args.report_dir.clone())
        .weights(weights)
        .rescale(rescale)
        .build();

    Ok(Tester::new(code, tests, config))
}

/// Prints the metric table and the final grade.
fn print_report(tester: &Tester) {
    let report = tester.report();
    let rows: Vec<MetricRow> = report
        .data()
        .iter()
        .map(|(key, entry)| MetricRow {
            metric:   key.clone(),
            value:    format!("{:.2}", entry.value),
            weight:   format!("{:.2}", entry.weight),
            weighted: format!("{:.2}", entry.value * entry.weight),
        })
        .collect();

    println!(
        "{}",
        Table::new(&rows)
            .with(Panel::header("Grading results"))
            .with(Panel::footer(format!("Final grade: {:.2}", report.grade())))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(
                Modify::new(Rows::last())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = options();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter_layer = LevelFilter::from_level(level);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let mut tester = build_tester(&args)?;

    let opts = RunOptions::builder()
        .save_report(!args.no_save)
        .force_setup(args.force_setup)
        .overwrite(args.overwrite)
        .clear_result_files(args.clear_results)
        .clear_staged(args.clear_staged)
        .build();

    tester.run(&opts).await?;
    print_report(&tester);

    if let Some(target) = args.push_report_to.as_deref() {
        tester.push_report_to(Some(target)).await?;
    }

    Ok(())
}
