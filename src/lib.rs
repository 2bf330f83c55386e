//! # autograde
//!
//! A pipeline for grading Python programming submissions: it stages student
//! (and optionally instructor) code and tests from local paths or remote
//! repositories, provisions isolated execution environments, runs the test
//! engine with coverage, scores pass rate, coverage, and style compliance,
//! and folds everything into a single weighted, rescalable grade report.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Explicit configuration structures for sources, weights, and run options
pub mod config;
/// Constant values shared across the pipeline
pub mod constants;
/// Typed errors for configuration and artifact failures
pub mod error;
/// Isolated execution environments for staged code trees
pub mod env;
/// Remote repository plumbing through the `git` binary
pub mod git;
/// Asynchronous subprocess execution with output capture
pub mod process;
/// The weighted-metric report and its persistence
pub mod report;
/// Locating and parsing the test engine's result files
pub mod results;
/// Source resolution and staging
pub mod source;
/// Style compliance scoring
pub mod style;
/// The orchestration engine sequencing a full grading run
pub mod tester;
/// Utility functions for file discovery and tree manipulation
pub mod util;
