//! Accuracy aggregation and statistical comparison.
//!
//! - Overall and per-class accuracy from [`EvaluationResult`] records
//! - Seeded bootstrap confidence intervals (10,000 resamples by default)
//! - Paired and Welch t-tests with Cohen's d, Bonferroni correction

use crate::evaluation::EvaluationResult;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;

/// Correct/total tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAccuracy {
    /// Correct predictions
    pub correct: usize,
    /// Total predictions
    pub total: usize,
}

impl ClassAccuracy {
    /// `correct / total`, `None` when nothing was counted
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }

    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }
}

/// Overall and per-class accuracy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracySummary {
    /// Across all results
    pub overall: ClassAccuracy,
    /// Keyed by ground-truth label; only classes with results appear
    pub per_class: BTreeMap<String, ClassAccuracy>,
}

/// Aggregate evaluation results into overall and per-class accuracy
#[must_use]
pub fn aggregate(results: &[EvaluationResult]) -> AccuracySummary {
    let mut summary = AccuracySummary::default();
    for result in results {
        summary.overall.record(result.correct);
        summary
            .per_class
            .entry(result.ground_truth.clone())
            .or_default()
            .record(result.correct);
    }
    summary
}

/// Per-sample correctness as 0.0 / 1.0 for resampling and t-tests
#[must_use]
pub fn correctness_vector(results: &[EvaluationResult]) -> Vec<f64> {
    results
        .iter()
        .map(|r| if r.correct { 1.0 } else { 0.0 })
        .collect()
}

/// Compute mean of samples
#[allow(clippy::cast_precision_loss)]
fn compute_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Compute standard deviation of samples
#[allow(clippy::cast_precision_loss)]
fn compute_std(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = compute_mean(samples);
    let variance =
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    variance.sqrt()
}

/// Statistical configuration for evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatConfig {
    /// Number of bootstrap resamples
    pub bootstrap_n: usize,
    /// Confidence level (e.g., 0.95)
    pub confidence: f64,
    /// Significance threshold
    pub alpha: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            bootstrap_n: 10_000,
            confidence: 0.95,
            alpha: 0.05,
            seed: 42,
        }
    }
}

/// Bootstrap confidence interval of the mean
///
/// Uses the percentile method with `config.bootstrap_n` resamples.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
pub fn bootstrap_ci(samples: &[f64], config: &StatConfig) -> (f64, f64) {
    if samples.len() < 2 || config.bootstrap_n == 0 {
        let mean = compute_mean(samples);
        return (mean, mean);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut bootstrap_means = Vec::with_capacity(config.bootstrap_n);

    for _ in 0..config.bootstrap_n {
        let resample_sum: f64 = (0..samples.len())
            .map(|_| {
                let idx = rng.next_u64() as usize % samples.len();
                samples[idx]
            })
            .sum();
        bootstrap_means.push(resample_sum / samples.len() as f64);
    }

    bootstrap_means.sort_by(f64::total_cmp);

    let alpha = 1.0 - config.confidence;
    let lower_idx = (config.bootstrap_n as f64 * (alpha / 2.0)).floor() as usize;
    let upper_idx = (config.bootstrap_n as f64 * (1.0 - alpha / 2.0)).ceil() as usize;

    let lower = bootstrap_means.get(lower_idx).copied().unwrap_or(0.0);
    let upper = bootstrap_means
        .get(upper_idx.min(bootstrap_means.len() - 1))
        .copied()
        .unwrap_or(0.0);

    (lower, upper)
}

impl AccuracySummary {
    /// Bootstrap CI of overall accuracy over the per-sample outcomes
    #[must_use]
    pub fn confidence_interval(results: &[EvaluationResult], config: &StatConfig) -> (f64, f64) {
        bootstrap_ci(&correctness_vector(results), config)
    }
}

/// Result of a significance test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificanceResult {
    /// t-statistic
    pub t_statistic: f64,
    /// p-value
    pub p_value: f64,
    /// Degrees of freedom
    pub degrees_of_freedom: f64,
    /// Is result significant at the given alpha?
    pub is_significant: bool,
    /// Cohen's d effect size
    pub cohens_d: f64,
    /// Effect size interpretation
    pub effect_interpretation: String,
}

/// Paired t-test for two models scored on the same samples
///
/// Returns `None` if the samples differ in length, are too small, or the
/// differences have no variance.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn paired_t_test(samples_a: &[f64], samples_b: &[f64], alpha: f64) -> Option<SignificanceResult> {
    if samples_a.len() != samples_b.len() || samples_a.len() < 2 {
        return None;
    }

    let n = samples_a.len();
    let differences: Vec<f64> = samples_a
        .iter()
        .zip(samples_b.iter())
        .map(|(a, b)| a - b)
        .collect();

    let mean_diff = compute_mean(&differences);
    let std_diff = compute_std(&differences);

    if std_diff < f64::EPSILON {
        return None;
    }

    let t_statistic = mean_diff / (std_diff / (n as f64).sqrt());
    let df = (n - 1) as f64;

    let t_dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p_value = 2.0 * (1.0 - t_dist.cdf(t_statistic.abs()));

    let cohens_d = mean_diff / std_diff;

    Some(SignificanceResult {
        t_statistic,
        p_value,
        degrees_of_freedom: df,
        is_significant: p_value < alpha,
        cohens_d,
        effect_interpretation: interpret_cohens_d(cohens_d),
    })
}

/// Independent samples t-test (Welch's t-test)
///
/// Returns `None` if either side has fewer than two samples or neither has
/// variance.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::suboptimal_flops)]
pub fn welch_t_test(samples_a: &[f64], samples_b: &[f64], alpha: f64) -> Option<SignificanceResult> {
    if samples_a.len() < 2 || samples_b.len() < 2 {
        return None;
    }

    let n_a = samples_a.len() as f64;
    let n_b = samples_b.len() as f64;
    let mean_a = compute_mean(samples_a);
    let mean_b = compute_mean(samples_b);
    let var_a = compute_std(samples_a).powi(2);
    let var_b = compute_std(samples_b).powi(2);

    if var_a < f64::EPSILON && var_b < f64::EPSILON {
        return None;
    }

    let se = ((var_a / n_a) + (var_b / n_b)).sqrt();
    if se < f64::EPSILON {
        return None;
    }

    let t_statistic = (mean_a - mean_b) / se;

    // Welch-Satterthwaite degrees of freedom
    let df_num = ((var_a / n_a) + (var_b / n_b)).powi(2);
    let df_denom = ((var_a / n_a).powi(2) / (n_a - 1.0)) + ((var_b / n_b).powi(2) / (n_b - 1.0));
    let df = if df_denom > f64::EPSILON {
        df_num / df_denom
    } else {
        (n_a + n_b - 2.0).max(1.0)
    };

    let t_dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p_value = 2.0 * (1.0 - t_dist.cdf(t_statistic.abs()));

    let pooled_std = (((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0)).sqrt();
    let cohens_d = if pooled_std > f64::EPSILON {
        (mean_a - mean_b) / pooled_std
    } else {
        0.0
    };

    Some(SignificanceResult {
        t_statistic,
        p_value,
        degrees_of_freedom: df,
        is_significant: p_value < alpha,
        cohens_d,
        effect_interpretation: interpret_cohens_d(cohens_d),
    })
}

/// Apply Bonferroni correction for multiple comparisons
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bonferroni_correction(alpha: f64, num_comparisons: usize) -> f64 {
    if num_comparisons == 0 {
        return alpha;
    }
    alpha / num_comparisons as f64
}

/// Interpret Cohen's d effect size
fn interpret_cohens_d(d: f64) -> String {
    let abs_d = d.abs();
    if abs_d < 0.2 {
        "negligible".to_string()
    } else if abs_d < 0.5 {
        "small".to_string()
    } else if abs_d < 0.8 {
        "medium".to_string()
    } else {
        "large".to_string()
    }
}

#[cfg(test)]
#[allow(
    clippy::float_cmp,
    clippy::cast_precision_loss,
    clippy::unwrap_used
)]
mod tests {
    use super::*;

    fn result(id: usize, truth: &str, prediction: &str, correct: bool) -> EvaluationResult {
        EvaluationResult {
            sample_id: id,
            ground_truth: truth.to_string(),
            prediction: prediction.to_string(),
            correct,
        }
    }

    // =========================================================================
    // Aggregation tests
    // =========================================================================

    #[test]
    fn test_aggregate_overall_and_per_class() {
        let results = vec![
            result(0, "n^1", "n^1", true),
            result(1, "n^1", "n^2", false),
            result(2, "p", "p", true),
        ];
        let summary = aggregate(&results);

        assert_eq!(summary.overall, ClassAccuracy { correct: 2, total: 3 });
        assert!((summary.overall.accuracy().unwrap() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.per_class["n^1"].accuracy(), Some(0.5));
        assert_eq!(summary.per_class["p"].accuracy(), Some(1.0));
        assert_eq!(summary.per_class.len(), 2);
    }

    #[test]
    fn test_aggregate_empty() {
        let summary = aggregate(&[]);
        assert_eq!(summary.overall.total, 0);
        assert!(summary.overall.accuracy().is_none());
        assert!(summary.per_class.is_empty());
    }

    #[test]
    fn test_correctness_vector() {
        let results = vec![result(0, "p", "p", true), result(1, "p", "n", false)];
        assert_eq!(correctness_vector(&results), vec![1.0, 0.0]);
    }

    #[test]
    fn test_confidence_interval_contains_accuracy() {
        let results: Vec<EvaluationResult> = (0..200)
            .map(|i| result(i, "n^1", "n^1", i % 4 != 0))
            .collect();
        let (lower, upper) = AccuracySummary::confidence_interval(&results, &StatConfig::default());
        assert!(lower <= 0.75 && upper >= 0.75);
        assert!(upper - lower < 0.2);
    }

    // =========================================================================
    // Statistical function tests
    // =========================================================================

    #[test]
    fn test_compute_std() {
        let samples = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = compute_std(&samples);
        // Sample std for this data is ~2.138
        assert!(std > 2.0 && std < 2.2, "std = {std}");
    }

    #[test]
    fn test_compute_std_single() {
        assert!(compute_std(&[5.0]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bootstrap_ci_reproducible() {
        let samples: Vec<f64> = (0..100).map(|i| 0.9 + (i as f64 * 0.001)).collect();
        let config = StatConfig::default();

        let first = bootstrap_ci(&samples, &config);
        let second = bootstrap_ci(&samples, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bootstrap_ci_single_sample() {
        let (lower, upper) = bootstrap_ci(&[0.95], &StatConfig::default());
        assert!((lower - 0.95).abs() < f64::EPSILON);
        assert!((upper - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_paired_t_test_significant() {
        let samples_a: Vec<f64> = (0..100).map(|i| if i % 10 == 0 { 0.0 } else { 1.0 }).collect();
        let samples_b: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();

        let result = paired_t_test(&samples_a, &samples_b, 0.05).unwrap();
        assert!(result.is_significant, "p={}", result.p_value);
        assert!(result.t_statistic > 0.0);
    }

    #[test]
    fn test_paired_t_test_unequal_length() {
        assert!(paired_t_test(&[0.9, 0.91, 0.92], &[0.8, 0.81], 0.05).is_none());
    }

    #[test]
    fn test_welch_t_test_significant() {
        let samples_a: Vec<f64> = (0..50).map(|i| 0.95 + (i as f64 * 0.002)).collect();
        let samples_b: Vec<f64> = (0..50).map(|i| 0.75 + (i as f64 * 0.002)).collect();

        let result = welch_t_test(&samples_a, &samples_b, 0.05).unwrap();
        assert!(result.is_significant);
        assert!(result.p_value < 0.05);
    }

    #[test]
    fn test_welch_t_test_small_sample() {
        assert!(welch_t_test(&[0.9], &[0.8], 0.05).is_none());
    }

    #[test]
    fn test_bonferroni_correction() {
        assert!((bonferroni_correction(0.05, 5) - 0.01).abs() < f64::EPSILON);
        assert!((bonferroni_correction(0.05, 0) - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cohens_d_interpretation() {
        assert_eq!(interpret_cohens_d(0.1), "negligible");
        assert_eq!(interpret_cohens_d(0.3), "small");
        assert_eq!(interpret_cohens_d(0.6), "medium");
        assert_eq!(interpret_cohens_d(-0.9), "large");
    }

    #[test]
    fn test_stat_config_default() {
        let config = StatConfig::default();
        assert_eq!(config.bootstrap_n, 10_000);
        assert_eq!(config.seed, 42);
    }
}
