#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Constant values shared across the grading pipeline: metric keys, artifact
//! file names, and the external-tool policy knobs.

/// Report key for the mean code-coverage metric.
pub const CODE_COVERAGE_KEY: &str = "code_coverage";

/// Report key for the student test pass-rate metric.
pub const PERCENT_PASSED_KEY: &str = "percent_passed";

/// Report key for the pass-rate against the instructor's reference tests.
pub const MASTER_PERCENT_PASSED_KEY: &str = "master_percent_passed";

/// Report key for the style-compliance metric.
pub const STYLE_KEY: &str = "style";

/// All metric keys a single grading run can produce, in the order they are
/// added to the report.
pub const METRIC_KEYS: &[&str] = &[
    CODE_COVERAGE_KEY,
    PERCENT_PASSED_KEY,
    STYLE_KEY,
    MASTER_PERCENT_PASSED_KEY,
];

/// File name for the temporary pytest JSON report of the student pass.
pub const DOT_JSON_REPORT_NAME: &str = ".tmp_report.json";

/// File name for the temporary pytest JSON report of the reference pass.
pub const MASTER_DOT_JSON_REPORT_NAME: &str = ".tmp_master_report.json";

/// File name the coverage plugin writes its JSON report to.
pub const COVERAGE_JSON_NAME: &str = "coverage.json";

/// File name of the raw coverage database the coverage plugin leaves behind.
pub const DOT_COVERAGE_NAME: &str = ".coverage";

/// File name of the persisted grade report.
pub const DEFAULT_REPORT_FILENAME: &str = "report.json";

/// Default directory name searched for when no code path is configured.
pub const DEFAULT_CODE_DIRNAME: &str = "src";

/// Default directory name searched for when no tests path is configured.
pub const DEFAULT_TESTS_DIRNAME: &str = "tests";

/// Staging directory name for reference code when none is configured.
pub const MASTER_CODE_DIRNAME: &str = "master_src";

/// Staging directory name for reference tests when none is configured.
pub const MASTER_TESTS_DIRNAME: &str = "master_tests";

/// Default virtual-environment directory name for the student's code.
pub const DEFAULT_VENV_DIRNAME: &str = "venv";

/// Virtual-environment directory name for the instructor's reference code.
pub const MASTER_VENV_DIRNAME: &str = "master_venv";

/// Suffix appended to reference test file stems before staging, so they never
/// shadow student test files sharing the same staging root.
pub const MASTER_TESTS_SUFFIX: &str = "_master";

/// Branch checked out when a remote source does not name one.
pub const DEFAULT_REPO_BRANCH: &str = "main";

/// Directory name, under the working directory, that remote sources are
/// cloned into. Reused across runs instead of re-cloning.
pub const CLONE_DIRNAME: &str = "tmp_git";

/// Scratch directory name used when pushing a report back to a repository.
pub const PUSH_CLONE_DIRNAME: &str = "tmp_repo";

/// Dependency manifest file name searched for near a staged code tree.
pub const REQUIREMENTS_FILENAME: &str = "requirements.txt";

/// Packages installed into every provisioned environment so the test engine,
/// its coverage and JSON-report plugins, and the style checker are available
/// even when the submission's manifest does not list them.
pub const BASELINE_REQUIREMENTS: &[&str] =
    &["pytest", "pytest-cov", "pytest-json-report", "pycodestyle"];

/// Maximum line length the style checker is configured with.
pub const STYLE_MAX_LINE_LENGTH: u32 = 120;

/// Style checks excluded from the error count.
pub const STYLE_IGNORE: &str = "W191,E501";

/// Pass ratio reported when a test suite contains zero tests.
pub const ZERO_TESTS_PASS_RATIO: f64 = 0.0;

/// Cache directories cleared from the working area around engine invocations.
pub const CACHE_DIRNAMES: &[&str] = &["__pycache__", ".pytest_cache"];

/// Compiled-artifact extension cleared alongside cache directories.
pub const BYTECODE_EXTENSION: &str = "pyc";
