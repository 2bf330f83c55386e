use std::fs;

use autograde::style::{count_physical_lines, parse_checker_output, style_score};
use tempfile::TempDir;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn clean_code_scores_full_marks() {
    assert!(close(style_score(0, 200), 100.0));
}

#[test]
fn score_falls_linearly_with_the_error_ratio() {
    assert!(close(style_score(10, 100), 90.0));
    assert!(close(style_score(50, 100), 50.0));
}

#[test]
fn score_clips_at_zero_when_errors_exceed_lines() {
    assert!(close(style_score(150, 100), 0.0));
}

#[test]
fn empty_directory_scores_full_marks() {
    // zero lines means a zero error ratio, never a division by zero
    assert!(close(style_score(0, 0), 100.0));
}

#[test]
fn parser_counts_violations_and_collects_distinct_codes() {
    let output = "\
src/a.py:1:1: E302 expected 2 blank lines, got 1
src/a.py:14:80: E226 missing whitespace around arithmetic operator
src/b.py:3:1: E302 expected 2 blank lines, got 1
";
    let (count, codes) = parse_checker_output(output);

    assert_eq!(count, 3);
    assert_eq!(codes.len(), 2);
    assert!(codes.contains("E302"));
    assert!(codes.contains("E226"));
}

#[test]
fn parser_skips_lines_that_are_not_violations() {
    let output = "\
src/a.py:5:9: W605 invalid escape sequence
some unrelated diagnostic line
src/a.py: summary without positions
";
    let (count, codes) = parse_checker_output(output);

    assert_eq!(count, 1);
    assert!(codes.contains("W605"));
}

#[test]
fn parser_handles_empty_output() {
    let (count, codes) = parse_checker_output("");

    assert_eq!(count, 0);
    assert!(codes.is_empty());
}

#[test]
fn physical_lines_sum_over_python_files_only() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("a.py"), "x = 1\ny = 2\n").expect("write a.py");
    fs::write(dir.path().join("b.py"), "z = 3\n").expect("write b.py");
    fs::write(dir.path().join("notes.txt"), "one\ntwo\nthree\n").expect("write notes.txt");

    let lines = count_physical_lines(dir.path()).expect("count lines");
    assert_eq!(lines, 3);
}

#[test]
fn physical_lines_cover_nested_directories() {
    let dir = TempDir::new().expect("tempdir");
    let nested = dir.path().join("pkg").join("sub");
    fs::create_dir_all(&nested).expect("create nested dirs");
    fs::write(dir.path().join("a.py"), "x = 1\n").expect("write a.py");
    fs::write(nested.join("b.py"), "y = 2\nz = 3\n").expect("write b.py");

    let lines = count_physical_lines(dir.path()).expect("count lines");
    assert_eq!(lines, 3);
}
