use autograde::results::TestRunSummary;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn all_passing_scores_full_marks() {
    let summary = TestRunSummary::from_counts(5, 0, 5);

    assert!(close(summary.ratio_passed, 1.0));
    assert!(close(summary.ratio_failed, 0.0));
    assert!(close(summary.percent_passed, 100.0));
    assert!(close(summary.percent_failed, 0.0));
}

#[test]
fn mixed_results_split_proportionally() {
    let summary = TestRunSummary::from_counts(8, 2, 10);

    assert!(close(summary.ratio_passed, 0.8));
    assert!(close(summary.ratio_failed, 0.2));
    assert!(close(summary.percent_passed, 80.0));
    assert!(close(summary.percent_failed, 20.0));
}

#[test]
fn zero_tests_scores_zero_not_nan() {
    // an empty suite must earn nothing, and must never divide by zero
    let summary = TestRunSummary::from_counts(0, 0, 0);

    assert!(close(summary.ratio_passed, 0.0));
    assert!(close(summary.ratio_failed, 1.0));
    assert!(close(summary.percent_passed, 0.0));
    assert!(summary.percent_passed.is_finite());
}

#[test]
fn skipped_tests_count_against_the_pass_ratio() {
    // pytest totals include tests that neither passed nor failed
    let summary = TestRunSummary::from_counts(6, 2, 10);

    assert!(close(summary.ratio_passed, 0.6));
    assert!(close(summary.percent_passed, 60.0));
}
