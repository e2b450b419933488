//! Labeled complexity dataset generation, loading, grouping and splitting.
//!
//! Samples are call paths of MPI benchmarks labeled with the asymptotic
//! complexity Extra-P fitted for them. Datasets are stored as JSON, either
//! as `{"samples": [...], "metadata": {...}}` or as a bare array.
//!
//! [`Dataset::from_measurements`] builds a dataset from the raw Extra-P
//! output tree, where each code has a `call_path.txt` and a complexity file
//! with one entry per line:
//!
//! ```text
//! data/
//! ├── case_1/{call_path.txt, complexity_bb.txt}
//! └── case_2/OUTPUT/CODE_<N>/{call_path.txt, complexity.txt}
//! ```

#![allow(clippy::missing_const_for_fn)]

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during dataset loading and splitting
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset file not found: {0}")]
    NotFound(String),

    #[error("No samples found in dataset")]
    Empty,

    #[error("Invalid split ratios: train={train}, val={val}, test={test} (must sum to 1)")]
    InvalidSplit { train: f64, val: f64, test: f64 },

    #[error("Unknown measurement case '{0}' (expected 1, 2 or all)")]
    InvalidCase(String),

    #[error("Failed to parse dataset JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Input parameter ranges a sample was measured over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterRanges {
    /// Problem sizes measured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub n: Vec<u64>,
    /// Process counts measured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub p: Vec<u64>,
}

/// A single evaluation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample identifier (reassigned when sampling or splitting)
    pub id: usize,
    /// Benchmark case (e.g. `case_1`)
    #[serde(default)]
    pub case: String,
    /// Code identifier within the case (e.g. `BC_MPI`, `CODE_3`)
    #[serde(default)]
    pub code_id: String,
    /// Call path from `main` to the target function
    pub call_path: String,
    /// Leaf function of the call path
    #[serde(default)]
    pub function_name: String,
    /// Ground-truth complexity label
    pub ground_truth: String,
    /// Source file the call path lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Measured parameter ranges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterRanges>,
}

impl Sample {
    /// Leaf function name of a call path like `main->compute(int)->MPI_Bcast`
    #[must_use]
    pub fn leaf_function(call_path: &str) -> String {
        call_path
            .rsplit("->")
            .next()
            .map(|leaf| leaf.split('(').next().unwrap_or(leaf).trim().to_string())
            .unwrap_or_default()
    }
}

/// Fix label typos present in the raw measurement files
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let label = label.trim();
    if label == "constat" {
        "constant".to_string()
    } else {
        label.to_string()
    }
}

/// Which raw measurement cases to ingest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeasurementCase {
    /// `case_1`: the `BC_MPI` benchmark
    One,
    /// `case_2`: the MPI kernel experiments under `OUTPUT/CODE_*`
    Two,
    /// Both cases, `case_1` first
    #[default]
    All,
}

impl MeasurementCase {
    const fn includes_case1(self) -> bool {
        matches!(self, Self::One | Self::All)
    }

    const fn includes_case2(self) -> bool {
        matches!(self, Self::Two | Self::All)
    }
}

impl FromStr for MeasurementCase {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "case_1" => Ok(Self::One),
            "2" | "case_2" => Ok(Self::Two),
            "all" => Ok(Self::All),
            _ => Err(DatasetError::InvalidCase(s.to_string())),
        }
    }
}

/// Non-blank, trimmed lines of a measurement file
fn read_lines(path: &Path) -> Result<Vec<String>, DatasetError> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Pair call paths with labels line by line, truncating to the shorter file
fn pair_measurements(
    case: &str,
    code_id: &str,
    source_file: &str,
    call_path_file: &Path,
    complexity_file: &Path,
) -> Result<Vec<Sample>, DatasetError> {
    let call_paths = read_lines(call_path_file)?;
    let labels = read_lines(complexity_file)?;
    if call_paths.len() != labels.len() {
        tracing::warn!(
            code_id,
            call_paths = call_paths.len(),
            complexities = labels.len(),
            "Call path and complexity counts differ, truncating to the shorter"
        );
    }

    Ok(call_paths
        .into_iter()
        .zip(labels)
        .map(|(call_path, label)| Sample {
            id: 0,
            case: case.to_string(),
            code_id: code_id.to_string(),
            function_name: Sample::leaf_function(&call_path),
            call_path,
            ground_truth: normalize_label(&label),
            source_file: Some(source_file.to_string()),
            parameters: None,
        })
        .collect())
}

fn load_case1(data_dir: &Path) -> Result<Vec<Sample>, DatasetError> {
    let dir = data_dir.join("case_1");
    let call_paths = dir.join("call_path.txt");
    let complexities = dir.join("complexity_bb.txt");
    if !call_paths.is_file() || !complexities.is_file() {
        tracing::warn!(dir = %dir.display(), "case_1 measurements not found");
        return Ok(Vec::new());
    }
    pair_measurements("case_1", "BC_MPI", "BC_MPI.cpp", &call_paths, &complexities)
}

fn load_case2(data_dir: &Path) -> Result<Vec<Sample>, DatasetError> {
    let output = data_dir.join("case_2").join("OUTPUT");
    if !output.is_dir() {
        tracing::warn!(
            dir = %output.display(),
            "case_2 OUTPUT not found, extract the experiment archives first"
        );
        return Ok(Vec::new());
    }

    let mut code_dirs = Vec::new();
    for entry in std::fs::read_dir(&output)? {
        let path = entry?.path();
        let is_code = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("CODE_"));
        if is_code && path.is_dir() {
            code_dirs.push(path);
        }
    }
    code_dirs.sort();

    let mut samples = Vec::new();
    for dir in code_dirs {
        let code_id = dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let call_paths = dir.join("call_path.txt");
        let complexities = dir.join("complexity.txt");
        if !call_paths.is_file() || !complexities.is_file() {
            tracing::warn!(dir = %dir.display(), "Missing measurement files, skipping");
            continue;
        }

        let source_file = format!("code_{}.cpp", code_id.trim_start_matches("CODE_"));
        samples.extend(pair_measurements(
            "case_2",
            &code_id,
            &source_file,
            &call_paths,
            &complexities,
        )?);
    }
    Ok(samples)
}

/// On-disk layout with optional metadata
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Wrapped {
        samples: Vec<Sample>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<DatasetMetadata>,
    },
    Bare(Vec<Sample>),
}

/// Summary metadata written next to the samples
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetMetadata {
    /// Number of samples
    pub total_samples: usize,
    /// Samples per complexity class
    pub complexity_distribution: BTreeMap<String, usize>,
    /// Distinct benchmark cases
    pub cases: Vec<String>,
    /// Distinct code identifiers
    pub code_ids: Vec<String>,
    /// Whether the file was produced by balanced sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balanced: Option<bool>,
}

/// Ordered collection of labeled samples
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Build a dataset from samples, normalizing their labels
    #[must_use]
    pub fn new(samples: Vec<Sample>) -> Self {
        let samples = samples
            .into_iter()
            .map(|mut s| {
                s.ground_truth = normalize_label(&s.ground_truth);
                if s.function_name.is_empty() {
                    s.function_name = Sample::leaf_function(&s.call_path);
                }
                s
            })
            .collect();
        Self { samples }
    }

    /// Build a dataset from raw measurement files under `data_dir`
    ///
    /// Missing case directories are logged and skipped. Ids are assigned
    /// `0..len` across all ingested cases.
    ///
    /// # Errors
    ///
    /// Returns an error if a measurement file cannot be read, or
    /// `DatasetError::Empty` if no samples were found.
    pub fn from_measurements<P: AsRef<Path>>(
        data_dir: P,
        case: MeasurementCase,
    ) -> Result<Self, DatasetError> {
        let data_dir = data_dir.as_ref();
        let mut samples = Vec::new();

        if case.includes_case1() {
            let loaded = load_case1(data_dir)?;
            tracing::info!(samples = loaded.len(), "Loaded case_1 measurements");
            samples.extend(loaded);
        }
        if case.includes_case2() {
            let loaded = load_case2(data_dir)?;
            tracing::info!(samples = loaded.len(), "Loaded case_2 measurements");
            samples.extend(loaded);
        }

        if samples.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(Self::renumbered(samples))
    }

    /// Load a dataset from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, isn't valid JSON, or
    /// contains no samples.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            samples = dataset.len(),
            classes = dataset.num_classes(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse a dataset from JSON text
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has no samples.
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let samples = match serde_json::from_str::<DatasetFile>(json)? {
            DatasetFile::Wrapped { samples, .. } | DatasetFile::Bare(samples) => samples,
        };
        if samples.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(Self::new(samples))
    }

    /// Write the dataset with metadata as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P, balanced: Option<bool>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut metadata = self.metadata();
        metadata.balanced = balanced;
        let file = DatasetFile::Wrapped {
            samples: self.samples.clone(),
            metadata: Some(metadata),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        tracing::info!(path = %path.display(), samples = self.len(), "Saved dataset");
        Ok(())
    }

    /// Get total number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if dataset is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get iterator over samples
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// All samples in file order
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Samples grouped by ground-truth label, each group in file order
    #[must_use]
    pub fn by_class(&self) -> BTreeMap<&str, Vec<&Sample>> {
        let mut groups: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
        for sample in &self.samples {
            groups.entry(sample.ground_truth.as_str()).or_default().push(sample);
        }
        groups
    }

    /// Number of distinct complexity classes
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.samples
            .iter()
            .map(|s| s.ground_truth.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Class sizes sorted by descending count, ties by label
    #[must_use]
    pub fn distribution(&self) -> Vec<(String, usize)> {
        let mut dist: Vec<(String, usize)> = self
            .by_class()
            .into_iter()
            .map(|(label, samples)| (label.to_string(), samples.len()))
            .collect();
        dist.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        dist
    }

    /// Compute file metadata
    #[must_use]
    pub fn metadata(&self) -> DatasetMetadata {
        let complexity_distribution = self
            .by_class()
            .into_iter()
            .map(|(label, samples)| (label.to_string(), samples.len()))
            .collect();
        let cases: BTreeSet<&str> = self.samples.iter().map(|s| s.case.as_str()).collect();
        let code_ids: BTreeSet<&str> = self.samples.iter().map(|s| s.code_id.as_str()).collect();

        DatasetMetadata {
            total_samples: self.samples.len(),
            complexity_distribution,
            cases: cases.into_iter().map(String::from).collect(),
            code_ids: code_ids.into_iter().map(String::from).collect(),
            balanced: None,
        }
    }

    /// Shuffle with a seed and split into train/val/test, reassigning ids
    /// within each split.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::InvalidSplit` if the ratios don't sum to 1 or
    /// any is negative or not finite.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn split(&self, ratios: SplitRatios, seed: u64) -> Result<DatasetSplit, DatasetError> {
        let SplitRatios { train, val, test } = ratios;
        let in_range = [train, val, test].iter().all(|r| r.is_finite() && *r >= 0.0);
        if !in_range || (train + val + test - 1.0).abs() > 1e-6 {
            return Err(DatasetError::InvalidSplit { train, val, test });
        }

        let mut shuffled = self.samples.clone();
        shuffled.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let n = shuffled.len();
        let train_end = (n as f64 * train) as usize;
        let val_end = train_end + (n as f64 * val) as usize;

        let test_part = shuffled.split_off(val_end.min(n));
        let val_part = shuffled.split_off(train_end.min(shuffled.len()));

        Ok(DatasetSplit {
            train: Self::renumbered(shuffled),
            val: Self::renumbered(val_part),
            test: Self::renumbered(test_part),
        })
    }

    /// Build a dataset with ids reassigned `0..len`
    #[must_use]
    pub fn renumbered(mut samples: Vec<Sample>) -> Self {
        for (i, sample) in samples.iter_mut().enumerate() {
            sample.id = i;
        }
        Self { samples }
    }
}

/// Train/validation/test proportions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    /// Training fraction
    pub train: f64,
    /// Validation fraction
    pub val: f64,
    /// Test fraction
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

/// Result of [`Dataset::split`]
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    /// Training set
    pub train: Dataset,
    /// Validation set
    pub val: Dataset,
    /// Test set
    pub test: Dataset,
}
