use autograde::report::{Report, RescaleParams};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn grade_is_weighted_mean_under_equal_weights() {
    let mut report = Report::new();
    report
        .add("code_coverage", 80.0, 1.0)
        .add("percent_passed", 80.0, 1.0)
        .add("style", 90.0, 1.0);

    assert!(close(report.grade(), (80.0 + 80.0 + 90.0) / 3.0));
}

#[test]
fn grade_matches_normalized_copy() {
    let mut report = Report::new();
    report
        .add("a", 60.0, 3.0)
        .add("b", 90.0, 1.0);

    let normalized = report.normalized();
    assert!(normalized.is_normalized());
    assert!(!report.is_normalized());
    assert!(close(report.grade(), normalized.grade()));
    // grading never mutates the original weights
    assert!(close(report.weight_of("a").expect("weight for a"), 3.0));
}

#[test]
fn grade_is_repeatable() {
    let mut report = Report::new();
    report.add("a", 72.5, 2.0).add("b", 31.0, 0.5);

    assert!(close(report.grade(), report.grade()));
}

#[test]
fn rescaling_maps_the_midpoint() {
    let mut report = Report::builder()
        .params(RescaleParams {
            grade_min:       50.0,
            grade_min_value: 50.0,
            grade_max:       100.0,
        })
        .build();
    report.add("only", 75.0, 1.0);

    // raw 75 sits halfway between 50 and 100, so it maps halfway between
    // 50 and 100 again
    assert!(close(report.grade(), 75.0));
}

#[test]
fn default_rescaling_is_identity() {
    let mut report = Report::new();
    report.add("only", 42.0, 1.0);

    assert!(close(report.grade(), 42.0));
}

#[test]
fn post_fn_applies_after_rescaling() {
    let mut report = Report::builder().post_fn(f64::round as fn(f64) -> f64).build();
    report.add("a", 33.4, 1.0).add("b", 33.9, 1.0);

    assert!(close(report.grade(), ((33.4 + 33.9) / 2.0f64).round()));
}

#[test]
fn degenerate_rescaling_domain_yields_a_finite_grade() {
    let mut report = Report::builder()
        .params(RescaleParams {
            grade_min:       100.0,
            grade_min_value: 100.0,
            grade_max:       100.0,
        })
        .build();
    report.add("only", 80.0, 1.0);

    let grade = report.grade();
    assert!(grade.is_finite());
    assert!(close(grade, 80.0));
}

#[test]
fn zero_total_weight_grades_as_zero() {
    let mut report = Report::new();
    report.add("a", 100.0, 0.0).add("b", 100.0, 0.0);

    assert!(close(report.grade(), 0.0));
}

#[test]
fn add_replaces_existing_key() {
    let mut report = Report::new();
    report.add("style", 50.0, 1.0);
    report.add("style", 75.0, 2.0);

    assert_eq!(report.len(), 1);
    assert!(close(report.value_of("style").expect("style value"), 75.0));
    assert!(close(report.weight_of("style").expect("style weight"), 2.0));
}

#[test]
fn save_then_load_restores_data_but_recomputes_grade() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");

    let mut saved = Report::builder()
        .params(RescaleParams {
            grade_min:       50.0,
            grade_min_value: 50.0,
            grade_max:       100.0,
        })
        .build();
    saved.add("percent_passed", 75.0, 1.0);
    let written = saved.save(Some(&path)).expect("save report");
    assert_eq!(written, path);

    // the loader has identity parameters; the saved rescaled grade must not
    // leak into it
    let mut loaded = Report::new();
    loaded.load(Some(&path)).expect("load report");

    assert_eq!(loaded.data(), saved.data());
    assert!(close(loaded.grade(), 75.0));
    assert!(close(saved.grade(), 75.0));
}

#[test]
fn load_restores_filepath_from_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");

    let mut saved = Report::new();
    saved.add("style", 90.0, 1.0);
    saved.save(Some(&path)).expect("save report");

    let mut loaded = Report::new();
    loaded.load(Some(&path)).expect("load report");
    assert_eq!(loaded.report_filepath(), Some(path.as_path()));
}

#[test]
fn round_trip_under_same_params_preserves_grade() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");
    let params = RescaleParams {
        grade_min:       40.0,
        grade_min_value: 55.0,
        grade_max:       100.0,
    };

    let mut saved = Report::builder().params(params).build();
    saved
        .add("code_coverage", 66.0, 1.0)
        .add("percent_passed", 88.0, 2.0);
    saved.save(Some(&path)).expect("save report");

    let mut loaded = Report::builder().params(params).build();
    loaded.load(Some(&path)).expect("load report");
    assert!(close(loaded.grade(), saved.grade()));
}

#[test]
fn snapshot_carries_params_as_kwargs() {
    let params = RescaleParams {
        grade_min:       10.0,
        grade_min_value: 20.0,
        grade_max:       90.0,
    };
    let mut report = Report::builder().params(params).build();
    report.add("a", 50.0, 1.0);

    let snapshot = report.snapshot();
    assert_eq!(snapshot.kwargs, params);
    assert!(snapshot.args.is_empty());
    assert!(close(snapshot.grade, report.grade()));
}
