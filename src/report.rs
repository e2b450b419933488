//! Multi-model comparison reports.
//!
//! Generates reports showing:
//! - Overall accuracy per model with bootstrap confidence intervals
//! - Per-class accuracy for every model
//! - Pairwise significance tests (Bonferroni-corrected)

use crate::evaluation::{ResultsError, ResultsFile};
use crate::metrics::{
    aggregate, bonferroni_correction, bootstrap_ci, correctness_vector, paired_t_test,
    welch_t_test, ClassAccuracy, SignificanceResult, StatConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as FmtWrite;
use tabled::{Table, Tabled};
use thiserror::Error;

/// Errors that can occur while building a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Glob error: {0}")]
    GlobError(#[from] glob::GlobError),

    #[error("No results files matched: {0}")]
    NoResults(String),

    #[error(transparent)]
    Results(#[from] ResultsError),
}

/// Full comparison report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Per-model summaries, best accuracy first
    pub models: Vec<ModelReport>,
    /// Class label -> model -> tally
    pub by_class: BTreeMap<String, BTreeMap<String, ClassAccuracy>>,
    /// Pairwise significance tests
    pub statistical_tests: Vec<StatisticalComparison>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Crate version
    pub framework_version: String,
    /// Statistical configuration used
    pub stat_config: StatConfig,
    /// Whether predictions were re-judged with the canonical comparator
    pub rescored: bool,
}

/// Per-model summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    /// Model identifier
    pub model: String,
    /// Accuracy with confidence interval
    pub accuracy: MetricWithCI,
    /// Correct predictions
    pub correct: usize,
    /// Answered samples
    pub total: usize,
}

/// Metric value with confidence interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricWithCI {
    /// Point estimate
    pub value: f64,
    /// Lower bound of CI
    pub ci_lower: f64,
    /// Upper bound of CI
    pub ci_upper: f64,
}

/// Statistical comparison between two models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalComparison {
    /// Model A identifier
    pub model_a: String,
    /// Model B identifier
    pub model_b: String,
    /// `paired` when both models answered the same samples, else `welch`
    pub test: String,
    /// Significance test result
    pub significance: SignificanceResult,
}

/// Report builder for constructing comparison reports
pub struct ReportBuilder {
    title: String,
    stat_config: StatConfig,
    rescore: bool,
    files: Vec<ResultsFile>,
}

impl ReportBuilder {
    /// Create a new report builder
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            stat_config: StatConfig::default(),
            rescore: false,
            files: Vec::new(),
        }
    }

    /// Set statistical configuration
    #[must_use]
    pub fn with_stat_config(mut self, config: StatConfig) -> Self {
        self.stat_config = config;
        self
    }

    /// Re-judge stored predictions before aggregating
    #[must_use]
    pub const fn with_rescore(mut self, rescore: bool) -> Self {
        self.rescore = rescore;
        self
    }

    /// Add one model's results
    pub fn add_results(&mut self, file: ResultsFile) {
        self.files.push(file);
    }

    /// Load every results file matching a glob pattern
    ///
    /// Files named `comparison_*` are skipped since they are reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid, nothing matches, or a
    /// file cannot be loaded.
    pub fn load_glob(mut self, pattern: &str) -> Result<Self, ReportError> {
        let before = self.files.len();
        for entry in glob::glob(pattern)? {
            let path = entry?;
            let is_report = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("comparison_"));
            if is_report {
                continue;
            }
            self.files.push(ResultsFile::load(&path)?);
        }
        if self.files.len() == before {
            return Err(ReportError::NoResults(pattern.to_string()));
        }
        Ok(self)
    }

    /// Build the report
    #[must_use]
    pub fn build(self) -> ComparisonReport {
        let files: Vec<ResultsFile> = if self.rescore {
            self.files.iter().map(ResultsFile::rescore).collect()
        } else {
            self.files
        };

        let mut models = Vec::with_capacity(files.len());
        let mut by_class: BTreeMap<String, BTreeMap<String, ClassAccuracy>> = BTreeMap::new();

        for file in &files {
            let summary = aggregate(&file.results);
            let (ci_lower, ci_upper) =
                bootstrap_ci(&correctness_vector(&file.results), &self.stat_config);

            models.push(ModelReport {
                model: file.model.clone(),
                accuracy: MetricWithCI {
                    value: summary.overall.accuracy().unwrap_or(0.0),
                    ci_lower,
                    ci_upper,
                },
                correct: summary.overall.correct,
                total: summary.overall.total,
            });

            for (label, tally) in summary.per_class {
                by_class
                    .entry(label)
                    .or_default()
                    .insert(file.model.clone(), tally);
            }
        }

        models.sort_by(|a, b| {
            b.accuracy
                .value
                .total_cmp(&a.accuracy.value)
                .then_with(|| a.model.cmp(&b.model))
        });

        let statistical_tests = build_statistical_tests(&files, self.stat_config.alpha);

        ComparisonReport {
            metadata: ReportMetadata {
                title: self.title,
                generated_at: Utc::now(),
                framework_version: env!("CARGO_PKG_VERSION").to_string(),
                stat_config: self.stat_config,
                rescored: self.rescore,
            },
            models,
            by_class,
            statistical_tests,
        }
    }
}

/// Outcomes keyed by sample id
fn outcomes_by_id(file: &ResultsFile) -> HashMap<usize, f64> {
    file.results
        .iter()
        .map(|r| (r.sample_id, if r.correct { 1.0 } else { 0.0 }))
        .collect()
}

fn build_statistical_tests(files: &[ResultsFile], alpha: f64) -> Vec<StatisticalComparison> {
    let pairs = files.len() * files.len().saturating_sub(1) / 2;
    let corrected_alpha = bonferroni_correction(alpha, pairs);
    let mut comparisons = Vec::new();

    for i in 0..files.len() {
        for j in (i + 1)..files.len() {
            let (a, b) = (&files[i], &files[j]);
            let ids_a = outcomes_by_id(a);
            let ids_b = outcomes_by_id(b);

            let same_samples = ids_a.len() == a.results.len()
                && ids_a.len() == ids_b.len()
                && ids_a.keys().all(|id| ids_b.contains_key(id));

            let (test, significance) = if same_samples {
                let mut ids: Vec<usize> = ids_a.keys().copied().collect();
                ids.sort_unstable();
                let xs: Vec<f64> = ids.iter().map(|id| ids_a[id]).collect();
                let ys: Vec<f64> = ids.iter().map(|id| ids_b[id]).collect();
                ("paired", paired_t_test(&xs, &ys, corrected_alpha))
            } else {
                (
                    "welch",
                    welch_t_test(
                        &correctness_vector(&a.results),
                        &correctness_vector(&b.results),
                        corrected_alpha,
                    ),
                )
            };

            if let Some(significance) = significance {
                comparisons.push(StatisticalComparison {
                    model_a: a.model.clone(),
                    model_b: b.model.clone(),
                    test: test.to_string(),
                    significance,
                });
            }
        }
    }

    comparisons
}

/// Table row for the model summary
#[derive(Tabled)]
struct ModelTableRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
    #[tabled(rename = "95% CI")]
    ci: String,
    #[tabled(rename = "Correct")]
    correct: String,
}

/// Table row for the per-class breakdown
#[derive(Tabled)]
struct ClassTableRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
    #[tabled(rename = "Correct")]
    correct: String,
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

impl ComparisonReport {
    /// Render report as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render report as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        writeln!(output, "# {}", self.metadata.title).ok();
        writeln!(output).ok();
        writeln!(
            output,
            "**Generated:** {}",
            self.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(output, "**Framework Version:** {}", self.metadata.framework_version).ok();
        if self.metadata.rescored {
            writeln!(output, "**Scoring:** canonical (rescored)").ok();
        }
        writeln!(output).ok();

        writeln!(output, "## Models").ok();
        writeln!(output).ok();
        let rows: Vec<ModelTableRow> = self
            .models
            .iter()
            .map(|m| ModelTableRow {
                model: m.model.clone(),
                accuracy: percent(Some(m.accuracy.value)),
                ci: format!(
                    "[{:.1}-{:.1}]",
                    m.accuracy.ci_lower * 100.0,
                    m.accuracy.ci_upper * 100.0
                ),
                correct: format!("{}/{}", m.correct, m.total),
            })
            .collect();
        writeln!(output, "{}", Table::new(rows)).ok();
        writeln!(output).ok();

        writeln!(output, "## Per-Class Accuracy").ok();
        writeln!(output).ok();
        let rows: Vec<ClassTableRow> = self
            .by_class
            .iter()
            .flat_map(|(class, per_model)| {
                per_model.iter().map(move |(model, tally)| ClassTableRow {
                    class: class.clone(),
                    model: model.clone(),
                    accuracy: percent(tally.accuracy()),
                    correct: format!("{}/{}", tally.correct, tally.total),
                })
            })
            .collect();
        writeln!(output, "{}", Table::new(rows)).ok();
        writeln!(output).ok();

        if !self.statistical_tests.is_empty() {
            writeln!(output, "## Statistical Comparisons").ok();
            writeln!(output).ok();
            writeln!(
                output,
                "| Comparison | Test | t-stat | p-value | Effect Size | Significant |"
            )
            .ok();
            writeln!(
                output,
                "|------------|------|--------|---------|-------------|-------------|"
            )
            .ok();
            for test in &self.statistical_tests {
                writeln!(
                    output,
                    "| {} vs {} | {} | {:.3} | {:.4} | {} ({:.2}) | {} |",
                    test.model_a,
                    test.model_b,
                    test.test,
                    test.significance.t_statistic,
                    test.significance.p_value,
                    test.significance.effect_interpretation,
                    test.significance.cohens_d,
                    if test.significance.is_significant {
                        "Yes"
                    } else {
                        "No"
                    }
                )
                .ok();
            }
            writeln!(output).ok();
        }

        writeln!(output, "## Configuration").ok();
        writeln!(output).ok();
        writeln!(
            output,
            "- Bootstrap resamples: {}",
            self.metadata.stat_config.bootstrap_n
        )
        .ok();
        writeln!(
            output,
            "- Confidence level: {:.0}%",
            self.metadata.stat_config.confidence * 100.0
        )
        .ok();
        writeln!(
            output,
            "- Significance threshold: {} (Bonferroni-corrected per pair)",
            self.metadata.stat_config.alpha
        )
        .ok();

        output
    }
}
