#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The weighted-metric accumulator that produces the final grade.
//!
//! A [`Report`] maps metric keys to `(value, weight)` entries and computes a
//! single bounded grade on demand: the weighted sum of values under
//! normalized weights, linearly rescaled from `[grade_min, grade_max]` to
//! `[grade_min_value, grade_max]`, optionally passed through a caller-supplied
//! post-processing function. Grade computation never mutates the stored data.

use std::{
    collections::BTreeMap,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use bon::Builder;
use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether weights already sum to one.
const NORMALIZED_EPSILON: f64 = 1e-9;

/// One metric entry: its measured value and its relative weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Measured metric value, conventionally a percentage in `[0, 100]`.
    pub value:  f64,
    /// Non-negative relative weight of this metric.
    pub weight: f64,
}

/// The linear rescaling parameters applied to the raw weighted sum.
///
/// The raw grade is mapped from the domain `[grade_min, grade_max]` onto the
/// range `[grade_min_value, grade_max]`. With the defaults the mapping is the
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleParams {
    /// Lower bound of the raw grade domain.
    pub grade_min:       f64,
    /// Value the rescaled grade takes when the raw grade equals `grade_min`.
    pub grade_min_value: f64,
    /// Upper bound of both the domain and the range.
    pub grade_max:       f64,
}

impl Default for RescaleParams {
    fn default() -> Self {
        Self {
            grade_min:       0.0,
            grade_min_value: 0.0,
            grade_max:       100.0,
        }
    }
}

/// Optional post-processing applied to the rescaled grade (rounding, floors).
pub type GradePostFn = fn(f64) -> f64;

/// On-disk snapshot of a report.
///
/// `grade` records the value computed at save time for human consumption; it
/// is never read back, because a reloaded report always recomputes its grade
/// from the restored data and the *current* instance's rescaling parameters.
/// `args` and `kwargs` carry the constructor arguments for external
/// reconstruction of the saving instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Grade computed by the saving instance.
    pub grade:           f64,
    /// The raw metric data.
    pub data:            BTreeMap<String, Entry>,
    /// Path the report was saved to.
    pub report_filepath: Option<PathBuf>,
    /// Positional constructor arguments (always empty for this crate).
    pub args:            Vec<serde_json::Value>,
    /// Keyword constructor arguments: the rescaling parameters.
    pub kwargs:          RescaleParams,
}

/// Accumulator of named, weighted metric values.
#[derive(Clone, Default, Builder)]
pub struct Report {
    /// Metric key to entry mapping. Keys are unique; insertion order is
    /// irrelevant.
    #[builder(default)]
    data:            BTreeMap<String, Entry>,
    /// Default persistence location.
    #[builder(into)]
    report_filepath: Option<PathBuf>,
    /// Rescaling parameters applied by [`Report::grade`].
    #[builder(default)]
    params:          RescaleParams,
    /// Optional post-processing of the rescaled grade.
    post_fn:         Option<GradePostFn>,
}

impl Report {
    /// Creates an empty report with default rescaling parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a metric entry. Weights must be non-negative.
    pub fn add(&mut self, key: impl Into<String>, value: f64, weight: f64) -> &mut Self {
        debug_assert!(weight >= 0.0, "metric weights must be non-negative");
        self.data.insert(key.into(), Entry { value, weight });
        self
    }

    /// Returns the entry for `key`, if present.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.data.get(key).copied()
    }

    /// Returns the value for `key`, if present.
    pub fn value_of(&self, key: &str) -> Option<f64> {
        self.get(key).map(|e| e.value)
    }

    /// Returns the weight for `key`, if present.
    pub fn weight_of(&self, key: &str) -> Option<f64> {
        self.get(key).map(|e| e.weight)
    }

    /// Returns `value * weight` for `key`, if present.
    pub fn weighted(&self, key: &str) -> Option<f64> {
        self.get(key).map(|e| e.value * e.weight)
    }

    /// Iterates over metric keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Number of metrics recorded.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no metrics have been recorded.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when `key` has been recorded.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// The raw metric data.
    pub fn data(&self) -> &BTreeMap<String, Entry> {
        &self.data
    }

    /// The configured persistence location.
    pub fn report_filepath(&self) -> Option<&Path> {
        self.report_filepath.as_deref()
    }

    /// The rescaling parameters in effect.
    pub fn params(&self) -> RescaleParams {
        self.params
    }

    /// Sum of all weights.
    fn total_weight(&self) -> f64 {
        self.data.values().map(|e| e.weight).sum()
    }

    /// True when the stored weights sum to one within floating tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.total_weight() - 1.0).abs() <= NORMALIZED_EPSILON
    }

    /// Normalizes the stored weights in place so they sum to one. A report
    /// whose weights sum to zero is left untouched.
    pub fn normalize_weights(&mut self) -> &mut Self {
        let total = self.total_weight();
        if total > 0.0 {
            for entry in self.data.values_mut() {
                entry.weight /= total;
            }
        }
        self
    }

    /// Returns a copy of this report with normalized weights. The original is
    /// not mutated.
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize_weights();
        copy
    }

    /// Weighted sum of values under a normalized view of the weights.
    fn raw_grade(&self) -> f64 {
        let view = if self.is_normalized() {
            None
        } else {
            Some(self.normalized())
        };
        let report = view.as_ref().unwrap_or(self);
        report.data.values().map(|e| e.value * e.weight).sum()
    }

    /// Computes the grade: normalized weighted sum, linearly rescaled, then
    /// post-processed. Read-only and repeatable; calling it twice with
    /// unchanged data yields identical results.
    pub fn grade(&self) -> f64 {
        let raw = self.raw_grade();
        let RescaleParams {
            grade_min,
            grade_min_value,
            grade_max,
        } = self.params;

        let scale = grade_max - grade_min;
        // a single-point domain cannot be rescaled; keep the raw grade
        let mut grade = if scale == 0.0 {
            raw
        } else {
            (grade_max - grade_min_value) * (raw - grade_min) / scale + grade_min_value
        };
        if let Some(post) = self.post_fn {
            grade = post(grade);
        }
        grade
    }

    /// Builds the on-disk snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grade:           self.grade(),
            data:            self.data.clone(),
            report_filepath: self.report_filepath.clone(),
            args:            Vec::new(),
            kwargs:          self.params,
        }
    }

    /// Saves the snapshot as indented JSON. A `path` argument replaces the
    /// stored persistence location before writing.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = path {
            self.report_filepath = Some(path.to_path_buf());
        }
        let target = self
            .report_filepath
            .clone()
            .context("no report filepath configured for save")?;

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(&target, json)
            .with_context(|| format!("Could not write report to {}", target.display()))?;
        Ok(target)
    }

    /// Loads a snapshot, replacing the stored data and persistence location.
    ///
    /// The saved grade and saved rescaling parameters are deliberately not
    /// applied: the grade is always recomputed from the restored data under
    /// this instance's own parameters.
    pub fn load(&mut self, path: Option<&Path>) -> Result<&mut Self> {
        if let Some(path) = path {
            self.report_filepath = Some(path.to_path_buf());
        }
        let source = self
            .report_filepath
            .clone()
            .context("no report filepath configured for load")?;

        let raw = fs::read_to_string(&source)
            .with_context(|| format!("Could not read report from {}", source.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Could not parse report at {}", source.display()))?;

        self.data = snapshot.data;
        self.report_filepath = snapshot.report_filepath.or(Some(source));
        Ok(self)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(&self.snapshot()).map_err(|_| std::fmt::Error)?;
        write!(f, "Report({json})")
    }
}
