use std::fs;

use autograde::{
    config::{RunOptions, SourceConfig, Weights},
    error::Error,
    source::{Source, SourceKind},
    tester::{Tester, TesterConfig},
};
use tempfile::TempDir;

fn local_source(kind: SourceKind, path: &std::path::Path) -> Source {
    let config = SourceConfig::builder().path(path.to_path_buf()).build();
    Source::new(kind, config).expect("construct local source")
}

fn code_and_tests(root: &std::path::Path) -> (Source, Source) {
    let src = root.join("submission").join("src");
    let tests = root.join("submission").join("tests");
    fs::create_dir_all(&src).expect("create src");
    fs::create_dir_all(&tests).expect("create tests");
    (
        local_source(SourceKind::Code, &src),
        local_source(SourceKind::Tests, &tests),
    )
}

#[test]
fn report_lands_in_the_configured_directory() {
    let dir = TempDir::new().expect("tempdir");
    let (code, tests) = code_and_tests(dir.path());
    let report_dir = dir.path().join("report_dir");

    let config = TesterConfig::builder()
        .report_dir(report_dir.clone())
        .build();
    let tester = Tester::new(code, tests, config);

    assert_eq!(tester.report_dir(), report_dir);
    assert_eq!(tester.report_filepath(), report_dir.join("report.json"));
}

#[test]
fn custom_report_filename_is_honored() {
    let dir = TempDir::new().expect("tempdir");
    let (code, tests) = code_and_tests(dir.path());
    let report_dir = dir.path().join("report_dir");

    let config = TesterConfig::builder()
        .report_dir(report_dir.clone())
        .report_filename("grades.json")
        .build();
    let tester = Tester::new(code, tests, config);

    assert_eq!(tester.report_filepath(), report_dir.join("grades.json"));
}

#[test]
fn previously_staged_trees_are_observable_at_construction() {
    let dir = TempDir::new().expect("tempdir");
    let (code, tests) = code_and_tests(dir.path());
    let report_dir = dir.path().join("report_dir");

    // a previous run left staged copies behind
    fs::create_dir_all(report_dir.join("src")).expect("pre-stage src");
    fs::create_dir_all(report_dir.join("tests")).expect("pre-stage tests");

    let config = TesterConfig::builder().report_dir(report_dir).build();
    let tester = Tester::new(code, tests, config);

    assert!(tester.is_staged());
}

#[test]
fn a_fresh_tester_is_not_staged() {
    let dir = TempDir::new().expect("tempdir");
    let (code, tests) = code_and_tests(dir.path());

    let config = TesterConfig::builder()
        .report_dir(dir.path().join("report_dir"))
        .build();
    let tester = Tester::new(code, tests, config);

    assert!(!tester.is_staged());
    assert!(tester.report().is_empty());
    assert!(tester.student_summary().is_none());
    assert!(tester.master_summary().is_none());
}

#[test]
fn default_weights_are_uniform() {
    let weights = Weights::default();

    assert_eq!(weights.get("code_coverage"), 1.0);
    assert_eq!(weights.get("percent_passed"), 1.0);
    assert_eq!(weights.get("master_percent_passed"), 1.0);
    assert_eq!(weights.get("style"), 1.0);
    assert_eq!(weights.get("something_unknown"), 1.0);
}

#[test]
fn negative_weight_overrides_are_rejected() {
    let mut weights = Weights::default();

    assert!(weights.set("style", 0.5).is_ok());
    let err = weights.set("style", -1.0).expect_err("negative must fail");
    assert!(matches!(err, Error::Config(_)));
    // the previous valid override is untouched
    assert_eq!(weights.get("style"), 0.5);
}

#[test]
fn run_option_defaults_keep_artifacts_and_save_the_report() {
    let opts = RunOptions::default();

    assert!(opts.save_report);
    assert!(!opts.force_setup);
    assert!(!opts.overwrite);
    assert!(!opts.clear_result_files);
    assert!(!opts.clear_staged);
}
