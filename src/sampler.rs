//! Class-balanced evaluation subset selection.
//!
//! The labeled dataset is heavily imbalanced (dozens of complexity classes,
//! from single samples to thousands). [`BalancedSampler`] draws a fixed-size
//! subset that is as close to uniform across classes as the data allows:
//!
//! 1. every class gets up to `floor(target / classes)` samples;
//! 2. leftover slots go one at a time to the class with spare samples and
//!    the lowest [`SecondPassPriority`] key.
//!
//! Within a class the sample order is a seeded shuffle, so a given dataset,
//! target, seed and priority always produce the same subset.

use crate::dataset::{Dataset, Sample};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Number of largest classes guaranteed slots in stratified mode
pub const STRATIFIED_TOP_CLASSES: usize = 15;

/// Errors that can occur during sampling
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SamplerError {
    #[error("Invalid sampler input: {0}")]
    InvalidInput(String),
}

/// How leftover slots are prioritized in the second pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondPassPriority {
    /// Lowest `taken / available` first
    #[default]
    Ratio,
    /// Lowest `taken` first
    Absolute,
}

impl std::str::FromStr for SecondPassPriority {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ratio" => Ok(Self::Ratio),
            "absolute" | "count" => Ok(Self::Absolute),
            _ => Err(SamplerError::InvalidInput(format!(
                "unknown priority '{s}' (expected ratio or absolute)"
            ))),
        }
    }
}

/// Sampling strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Equal quota per class, leftovers by priority
    #[default]
    Balanced,
    /// Quota for the largest classes, remainder uniformly at random
    Stratified,
}

/// Sampler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Sampling strategy
    pub mode: SamplingMode,
    /// Second-pass priority (balanced mode only)
    pub priority: SecondPassPriority,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            mode: SamplingMode::Balanced,
            priority: SecondPassPriority::Ratio,
        }
    }
}

/// Samples chosen per class
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSubset {
    /// Chosen samples keyed by class label, in selection order
    pub classes: BTreeMap<String, Vec<Sample>>,
    /// Requested subset size
    pub target_total: usize,
    /// Set when the dataset had fewer samples than requested
    pub shortfall: bool,
}

impl SampledSubset {
    /// Total number of chosen samples
    #[must_use]
    pub fn total(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    /// Number of samples chosen for `label`
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.classes.get(label).map_or(0, Vec::len)
    }

    /// Per-class counts
    #[must_use]
    pub fn counts(&self) -> BTreeMap<&str, usize> {
        self.classes
            .iter()
            .map(|(label, samples)| (label.as_str(), samples.len()))
            .collect()
    }

    /// Flatten into a shuffled dataset with ids reassigned `0..len`
    #[must_use]
    pub fn into_dataset(self, seed: u64) -> Dataset {
        let mut samples: Vec<Sample> = self.classes.into_values().flatten().collect();
        samples.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        Dataset::renumbered(samples)
    }
}

/// Per-class sampling state
struct ClassPool<'a> {
    label: &'a str,
    order: Vec<&'a Sample>,
    taken: usize,
}

impl ClassPool<'_> {
    fn available(&self) -> usize {
        self.order.len()
    }

    fn has_capacity(&self) -> bool {
        self.taken < self.order.len()
    }

    /// Ordering key for the second pass; lower means served first
    fn cmp_priority(&self, other: &Self, priority: SecondPassPriority) -> Ordering {
        let primary = match priority {
            SecondPassPriority::Ratio => {
                cmp_ratio(self.taken, self.available(), other.taken, other.available())
            }
            SecondPassPriority::Absolute => self.taken.cmp(&other.taken),
        };
        primary
            .then_with(|| self.available().cmp(&other.available()))
            .then_with(|| self.label.cmp(other.label))
    }
}

/// Compare `taken_a / avail_a` with `taken_b / avail_b` exactly
fn cmp_ratio(taken_a: usize, avail_a: usize, taken_b: usize, avail_b: usize) -> Ordering {
    let widen = |x: usize| x as u128;
    (widen(taken_a) * widen(avail_b)).cmp(&(widen(taken_b) * widen(avail_a)))
}

/// Seeded class-balanced sampler
#[derive(Debug, Clone, Default)]
pub struct BalancedSampler {
    config: SamplerConfig,
}

impl BalancedSampler {
    /// Create a sampler with default configuration (seed 42, ratio priority)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sampler with custom configuration
    #[must_use]
    pub const fn with_config(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Select up to `target_total` samples according to the configured mode
    ///
    /// # Errors
    ///
    /// Returns `SamplerError::InvalidInput` if `target_total` is zero or the
    /// dataset has no samples.
    pub fn sample(&self, dataset: &Dataset, target_total: usize) -> Result<SampledSubset, SamplerError> {
        if target_total == 0 {
            return Err(SamplerError::InvalidInput(
                "target_total must be greater than zero".to_string(),
            ));
        }
        if dataset.is_empty() {
            return Err(SamplerError::InvalidInput("dataset has no samples".to_string()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut pools: Vec<ClassPool<'_>> = dataset
            .by_class()
            .into_iter()
            .map(|(label, mut order)| {
                order.shuffle(&mut rng);
                ClassPool {
                    label,
                    order,
                    taken: 0,
                }
            })
            .collect();

        let shortfall = target_total > dataset.len();
        if shortfall {
            tracing::warn!(
                target_total,
                available = dataset.len(),
                "Requested more samples than the dataset holds, returning all samples"
            );
        }

        let subset = match self.config.mode {
            SamplingMode::Balanced => {
                Self::fill_balanced(&mut pools, target_total, self.config.priority);
                Self::collect(&pools, target_total, shortfall)
            }
            SamplingMode::Stratified => Self::fill_stratified(&pools, target_total, shortfall, &mut rng),
        };

        tracing::info!(
            mode = ?self.config.mode,
            seed = self.config.seed,
            target_total,
            selected = subset.total(),
            classes = subset.classes.len(),
            "Sampled evaluation subset"
        );
        Ok(subset)
    }

    fn fill_balanced(pools: &mut [ClassPool<'_>], target_total: usize, priority: SecondPassPriority) {
        let base_quota = target_total / pools.len();

        for pool in pools.iter_mut() {
            pool.taken = pool.available().min(base_quota);
        }

        let mut remaining = target_total - pools.iter().map(|p| p.taken).sum::<usize>();
        tracing::debug!(base_quota, remaining, "First pass complete");

        while remaining > 0 {
            let Some(next) = pools
                .iter_mut()
                .filter(|p| p.has_capacity())
                .min_by(|a, b| a.cmp_priority(b, priority))
            else {
                break;
            };
            next.taken += 1;
            remaining -= 1;
        }
    }

    fn collect(pools: &[ClassPool<'_>], target_total: usize, shortfall: bool) -> SampledSubset {
        let classes = pools
            .iter()
            .filter(|p| p.taken > 0)
            .map(|p| {
                let chosen = p.order[..p.taken].iter().map(|s| (*s).clone()).collect();
                (p.label.to_string(), chosen)
            })
            .collect();

        SampledSubset {
            classes,
            target_total,
            shortfall,
        }
    }

    fn fill_stratified(
        pools: &[ClassPool<'_>],
        target_total: usize,
        shortfall: bool,
        rng: &mut ChaCha8Rng,
    ) -> SampledSubset {
        let mut by_size: Vec<&ClassPool<'_>> = pools.iter().collect();
        by_size.sort_by(|a, b| b.available().cmp(&a.available()).then_with(|| a.label.cmp(b.label)));
        let top = &by_size[..by_size.len().min(STRATIFIED_TOP_CLASSES)];
        let per_class = (target_total / top.len()).max(1);

        let mut selected: Vec<&Sample> = Vec::with_capacity(target_total);
        for pool in top {
            let take = per_class.min(pool.available()).min(target_total - selected.len());
            selected.extend_from_slice(&pool.order[..take]);
        }

        let remaining = target_total.saturating_sub(selected.len());
        if remaining > 0 {
            let chosen: HashSet<*const Sample> = selected.iter().map(|s| std::ptr::from_ref(*s)).collect();
            let mut rest: Vec<&Sample> = pools
                .iter()
                .flat_map(|p| p.order.iter().copied())
                .filter(|s| !chosen.contains(&std::ptr::from_ref(*s)))
                .collect();
            rest.shuffle(rng);
            rest.truncate(remaining);
            selected.extend(rest);
        }

        let mut classes: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
        for sample in selected {
            classes
                .entry(sample.ground_truth.clone())
                .or_default()
                .push(sample.clone());
        }

        SampledSubset {
            classes,
            target_total,
            shortfall,
        }
    }
}

/// Balanced sampling with the default configuration and a given seed
///
/// # Errors
///
/// See [`BalancedSampler::sample`].
pub fn sample(dataset: &Dataset, target_total: usize, seed: u64) -> Result<SampledSubset, SamplerError> {
    BalancedSampler::with_config(SamplerConfig {
        seed,
        ..SamplerConfig::default()
    })
    .sample(dataset, target_total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dataset_with(classes: &[(&str, usize)]) -> Dataset {
        let mut samples = Vec::new();
        for (label, count) in classes {
            for _ in 0..*count {
                let id = samples.len();
                samples.push(Sample {
                    id,
                    case: "case_2".to_string(),
                    code_id: "CODE_1".to_string(),
                    call_path: format!("main->f{id}"),
                    function_name: format!("f{id}"),
                    ground_truth: (*label).to_string(),
                    source_file: None,
                    parameters: None,
                });
            }
        }
        Dataset::new(samples)
    }

    #[test]
    fn test_exhausted_class_gives_slots_to_others() {
        let dataset = dataset_with(&[("a", 5), ("b", 50)]);
        let subset = sample(&dataset, 10, 42).unwrap();
        assert_eq!(subset.count("a"), 5);
        assert_eq!(subset.count("b"), 5);
        assert_eq!(subset.total(), 10);
        assert!(!subset.shortfall);
    }

    #[test]
    fn test_second_pass_fills_target() {
        let dataset = dataset_with(&[("a", 2), ("b", 50), ("c", 50)]);
        let subset = sample(&dataset, 20, 1).unwrap();
        assert_eq!(subset.total(), 20);
        assert_eq!(subset.count("a"), 2);
        assert_eq!(subset.count("b"), 9);
        assert_eq!(subset.count("c"), 9);
    }

    #[test]
    fn test_ratio_priority_favors_underrepresented_share() {
        // base quota 1: a=1/2, b=1/10; one leftover goes to b under ratio
        let dataset = dataset_with(&[("a", 2), ("b", 10)]);
        let subset = sample(&dataset, 3, 42).unwrap();
        assert_eq!(subset.count("a"), 1);
        assert_eq!(subset.count("b"), 2);
    }

    #[test]
    fn test_absolute_priority_favors_rarest_on_tie() {
        let dataset = dataset_with(&[("a", 2), ("b", 10)]);
        let sampler = BalancedSampler::with_config(SamplerConfig {
            priority: SecondPassPriority::Absolute,
            ..SamplerConfig::default()
        });
        let subset = sampler.sample(&dataset, 3).unwrap();
        assert_eq!(subset.count("a"), 2);
        assert_eq!(subset.count("b"), 1);
    }

    #[test]
    fn test_target_smaller_than_class_count() {
        let dataset = dataset_with(&[("a", 3), ("b", 1), ("c", 2)]);
        let subset = sample(&dataset, 2, 42).unwrap();
        assert_eq!(subset.total(), 2);
        // Rarest classes first on an all-zero tie
        assert_eq!(subset.count("b"), 1);
        assert_eq!(subset.count("c"), 1);
    }

    #[test]
    fn test_target_exceeds_available() {
        let dataset = dataset_with(&[("a", 3), ("b", 4)]);
        let subset = sample(&dataset, 100, 42).unwrap();
        assert_eq!(subset.total(), 7);
        assert!(subset.shortfall);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let dataset = dataset_with(&[("a", 30), ("b", 40), ("c", 7)]);
        let first = sample(&dataset, 25, 9).unwrap();
        let second = sample(&dataset, 25, 9).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seed_changes_selection() {
        let dataset = dataset_with(&[("a", 200)]);
        let first = sample(&dataset, 10, 1).unwrap();
        let second = sample(&dataset, 10, 2).unwrap();
        assert_ne!(first.classes["a"], second.classes["a"]);
    }

    #[test]
    fn test_no_duplicates_within_class() {
        let dataset = dataset_with(&[("a", 20), ("b", 20)]);
        let subset = sample(&dataset, 30, 3).unwrap();
        let ids: HashSet<usize> = subset.classes.values().flatten().map(|s| s.id).collect();
        assert_eq!(ids.len(), 30);
    }

    #[test]
    fn test_zero_target_rejected() {
        let dataset = dataset_with(&[("a", 3)]);
        assert!(matches!(sample(&dataset, 0, 42), Err(SamplerError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let dataset = Dataset::default();
        assert!(matches!(sample(&dataset, 5, 42), Err(SamplerError::InvalidInput(_))));
    }

    #[test]
    fn test_stratified_mode_respects_target() {
        let dataset = dataset_with(&[("a", 30), ("b", 3), ("c", 12)]);
        let sampler = BalancedSampler::with_config(SamplerConfig {
            mode: SamplingMode::Stratified,
            ..SamplerConfig::default()
        });
        let subset = sampler.sample(&dataset, 20).unwrap();
        assert_eq!(subset.total(), 20);
        assert_eq!(subset.count("b"), 3);
        assert!(subset.count("a") >= 6);
        assert!(subset.count("c") >= 6);
    }

    #[test]
    fn test_into_dataset_renumbers() {
        let dataset = dataset_with(&[("a", 5), ("b", 5)]);
        let flat = sample(&dataset, 6, 42).unwrap().into_dataset(42);
        assert_eq!(flat.len(), 6);
        assert!(flat.iter().enumerate().all(|(i, s)| s.id == i));
    }

    #[test]
    fn test_cmp_ratio_large_counts() {
        let big = usize::MAX;
        assert_eq!(cmp_ratio(big - 1, big, 1, 2), Ordering::Greater);
        assert_eq!(cmp_ratio(1, 2, big - 1, big), Ordering::Less);
        assert_eq!(cmp_ratio(big / 2, big - 1, 1, 2), Ordering::Equal);
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("ratio".parse::<SecondPassPriority>().unwrap(), SecondPassPriority::Ratio);
        assert_eq!("ABSOLUTE".parse::<SecondPassPriority>().unwrap(), SecondPassPriority::Absolute);
        assert!("median".parse::<SecondPassPriority>().is_err());
    }
}
