use std::{fs, path::Path};

use autograde::{constants::DOT_JSON_REPORT_NAME, error::Error, results::ResultCollector};
use tempfile::TempDir;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn write_engine_report(dir: &Path, passed: u64, failed: u64, total: u64) {
    let json = format!(
        r#"{{"summary": {{"passed": {passed}, "failed": {failed}, "total": {total}}}}}"#
    );
    fs::write(dir.join(DOT_JSON_REPORT_NAME), json).expect("write engine report");
}

fn write_coverage_report(dir: &Path, entries: &[(&str, f64)]) {
    let files: Vec<String> = entries
        .iter()
        .map(|(path, percent)| {
            format!(r#""{path}": {{"summary": {{"percent_covered": {percent}}}}}"#)
        })
        .collect();
    let json = format!(r#"{{"files": {{{}}}}}"#, files.join(", "));
    fs::write(dir.join("coverage.json"), json).expect("write coverage report");
}

#[test]
fn test_summary_parses_engine_counts() {
    let dir = TempDir::new().expect("tempdir");
    write_engine_report(dir.path(), 7, 3, 10);

    let collector = ResultCollector::new(dir.path(), dir.path());
    let summary = collector
        .test_summary(DOT_JSON_REPORT_NAME)
        .expect("parse summary");

    assert_eq!(summary.passed, 7);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.total, 10);
    assert!(close(summary.percent_passed, 70.0));
}

#[test]
fn test_summary_defaults_omitted_counts_to_zero() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join(DOT_JSON_REPORT_NAME),
        r#"{"summary": {"passed": 4, "total": 4}}"#,
    )
    .expect("write engine report");

    let collector = ResultCollector::new(dir.path(), dir.path());
    let summary = collector
        .test_summary(DOT_JSON_REPORT_NAME)
        .expect("parse summary");

    assert_eq!(summary.failed, 0);
    assert!(close(summary.percent_passed, 100.0));
}

#[test]
fn missing_engine_report_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let collector = ResultCollector::new(dir.path(), dir.path());

    let err = collector
        .test_summary(DOT_JSON_REPORT_NAME)
        .expect_err("missing report must error");
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MissingArtifact(_))
    ));
}

#[test]
fn coverage_is_the_mean_of_files_under_the_code_dir() {
    let dir = TempDir::new().expect("tempdir");
    let code_dir = dir.path().join("src");
    fs::create_dir_all(&code_dir).expect("create code dir");

    let a = code_dir.join("a.py");
    let b = code_dir.join("b.py");
    fs::write(&a, "x = 1\n").expect("write a.py");
    fs::write(&b, "y = 2\n").expect("write b.py");
    let a_key = a.display().to_string();
    let b_key = b.display().to_string();
    write_coverage_report(dir.path(), &[(a_key.as_str(), 80.0), (b_key.as_str(), 60.0)]);

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(close(collector.coverage_percent(&code_dir), 70.0));
}

#[test]
fn coverage_ignores_files_outside_the_code_dir() {
    let dir = TempDir::new().expect("tempdir");
    let code_dir = dir.path().join("src");
    let other_dir = dir.path().join("tests");
    fs::create_dir_all(&code_dir).expect("create code dir");
    fs::create_dir_all(&other_dir).expect("create other dir");

    let inside = code_dir.join("a.py");
    let outside = other_dir.join("test_a.py");
    fs::write(&inside, "x = 1\n").expect("write a.py");
    fs::write(&outside, "assert True\n").expect("write test_a.py");
    let inside_key = inside.display().to_string();
    let outside_key = outside.display().to_string();
    write_coverage_report(
        dir.path(),
        &[(inside_key.as_str(), 50.0), (outside_key.as_str(), 100.0)],
    );

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(close(collector.coverage_percent(&code_dir), 50.0));
}

#[test]
fn coverage_resolves_relative_keys_against_the_report_dir() {
    // the engine runs from the report directory, so its coverage report
    // lists files relative to it
    let dir = TempDir::new().expect("tempdir");
    let code_dir = dir.path().join("src");
    fs::create_dir_all(&code_dir).expect("create code dir");
    fs::write(code_dir.join("a.py"), "x = 1\n").expect("write a.py");
    write_coverage_report(dir.path(), &[("src/a.py", 80.0)]);

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(close(collector.coverage_percent(&code_dir), 80.0));
}

#[test]
fn relative_keys_outside_the_code_dir_are_still_excluded() {
    let dir = TempDir::new().expect("tempdir");
    let code_dir = dir.path().join("src");
    let tests_dir = dir.path().join("tests");
    fs::create_dir_all(&code_dir).expect("create code dir");
    fs::create_dir_all(&tests_dir).expect("create tests dir");
    fs::write(code_dir.join("a.py"), "x = 1\n").expect("write a.py");
    fs::write(tests_dir.join("test_a.py"), "assert True\n").expect("write test_a.py");
    write_coverage_report(
        dir.path(),
        &[("src/a.py", 40.0), ("tests/test_a.py", 100.0)],
    );

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(close(collector.coverage_percent(&code_dir), 40.0));
}

#[test]
fn absent_coverage_report_scores_zero() {
    let dir = TempDir::new().expect("tempdir");
    let collector = ResultCollector::new(dir.path(), dir.path());

    assert!(close(collector.coverage_percent(dir.path()), 0.0));
}

#[test]
fn unparsable_coverage_report_scores_zero() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("coverage.json"), "not json at all").expect("write junk");

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(close(collector.coverage_percent(dir.path()), 0.0));
}

#[test]
fn coverage_report_with_no_matching_files_scores_zero() {
    let dir = TempDir::new().expect("tempdir");
    let code_dir = dir.path().join("src");
    fs::create_dir_all(&code_dir).expect("create code dir");
    write_coverage_report(dir.path(), &[("/somewhere/else/a.py", 90.0)]);

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(close(collector.coverage_percent(&code_dir), 0.0));
}

#[test]
fn gather_moves_artifacts_into_the_report_dir() {
    let dir = TempDir::new().expect("tempdir");
    let report_dir = dir.path().join("report_dir");
    let exec_root = dir.path().join("exec");
    fs::create_dir_all(&exec_root).expect("create exec root");
    write_engine_report(&exec_root, 1, 0, 1);

    let collector = ResultCollector::new(&report_dir, &exec_root);
    collector.gather().expect("gather artifacts");

    assert!(report_dir.join(DOT_JSON_REPORT_NAME).exists());
    assert!(!exec_root.join(DOT_JSON_REPORT_NAME).exists());
}

#[test]
fn gather_reindents_json_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    let report_dir = dir.path().join("report_dir");
    let exec_root = dir.path().join("exec");
    fs::create_dir_all(&exec_root).expect("create exec root");
    fs::write(
        exec_root.join(DOT_JSON_REPORT_NAME),
        r#"{"summary":{"passed":1,"failed":0,"total":1}}"#,
    )
    .expect("write compact report");

    let collector = ResultCollector::new(&report_dir, &exec_root);
    collector.gather().expect("gather artifacts");

    let contents =
        fs::read_to_string(report_dir.join(DOT_JSON_REPORT_NAME)).expect("read gathered report");
    assert!(contents.contains("    \"summary\""));
}

#[test]
fn clear_artifacts_removes_known_result_files() {
    let dir = TempDir::new().expect("tempdir");
    write_engine_report(dir.path(), 1, 0, 1);
    write_coverage_report(dir.path(), &[("a.py", 10.0)]);

    let collector = ResultCollector::new(dir.path(), dir.path());
    assert!(!collector.present_artifacts().is_empty());

    collector.clear_artifacts().expect("clear artifacts");
    assert!(collector.present_artifacts().is_empty());
    assert!(!dir.path().join(DOT_JSON_REPORT_NAME).exists());
    assert!(!dir.path().join("coverage.json").exists());
}
