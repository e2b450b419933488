//! Per-sample evaluation records and persisted results files.
//!
//! The evaluation driver queries an LLM once per sample and stores one
//! [`EvaluationResult`] per answered sample in a JSON results file:
//!
//! ```json
//! {"model": "deepseek-chat", "accuracy": 42.0, "results": [
//!   {"id": 0, "ground_truth": "n^(1)", "prediction": "n", "correct": true}
//! ]}
//! ```

use crate::complexity::{compare, extract_label};
use crate::metrics::aggregate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur reading or writing results files
#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Results file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse results JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Sample identifier
    #[serde(rename = "id")]
    pub sample_id: usize,
    /// Ground-truth complexity label
    pub ground_truth: String,
    /// Raw model answer
    pub prediction: String,
    /// Whether the prediction matched
    pub correct: bool,
}

impl EvaluationResult {
    /// Judge a raw model answer against ground truth with the canonical
    /// comparator.
    #[must_use]
    pub fn judge(sample_id: usize, ground_truth: &str, prediction: &str) -> Self {
        let correct = compare(&extract_label(prediction), ground_truth);
        Self {
            sample_id,
            ground_truth: ground_truth.to_string(),
            prediction: prediction.to_string(),
            correct,
        }
    }
}

/// A model's persisted evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    /// Model identifier
    #[serde(default)]
    pub model: String,
    /// Overall accuracy in percent
    #[serde(default)]
    pub accuracy: f64,
    /// Per-sample results
    pub results: Vec<EvaluationResult>,
}

impl ResultsFile {
    /// Build a results file, computing accuracy from the records
    #[must_use]
    pub fn new(model: &str, results: Vec<EvaluationResult>) -> Self {
        let accuracy = aggregate(&results).overall.accuracy().unwrap_or(0.0) * 100.0;
        Self {
            model: model.to_string(),
            accuracy,
            results,
        }
    }

    /// Load a results file
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or isn't valid JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ResultsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ResultsError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut file: Self = serde_json::from_str(&content)?;
        if file.model.is_empty() {
            file.model = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        tracing::debug!(path = %path.display(), model = %file.model, results = file.results.len(), "Loaded results");
        Ok(file)
    }

    /// Write as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ResultsError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Re-judge every prediction with the canonical comparator.
    ///
    /// Returns a fresh file; the stored `correct` flags of `self` are left
    /// untouched.
    #[must_use]
    pub fn rescore(&self) -> Self {
        let results: Vec<EvaluationResult> = self
            .results
            .iter()
            .map(|r| EvaluationResult::judge(r.sample_id, &r.ground_truth, &r.prediction))
            .collect();

        let flipped = results
            .iter()
            .zip(&self.results)
            .filter(|(new, old)| new.correct != old.correct)
            .count();
        tracing::info!(model = %self.model, flipped, "Rescored results");

        Self::new(&self.model, results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_judge_canonical_match() {
        let r = EvaluationResult::judge(3, "n^(3/2)", "Complexity: n^1.5");
        assert!(r.correct);
        assert_eq!(r.sample_id, 3);
        assert_eq!(r.prediction, "Complexity: n^1.5");
    }

    #[test]
    fn test_judge_malformed_prediction() {
        let r = EvaluationResult::judge(0, "n^(1)", "I cannot determine this");
        assert!(!r.correct);
    }

    #[test]
    fn test_results_file_accuracy() {
        let file = ResultsFile::new(
            "model-a",
            vec![
                EvaluationResult::judge(0, "n^(1)", "n"),
                EvaluationResult::judge(1, "n^(1)", "n^2"),
            ],
        );
        assert!((file.accuracy - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rescore_fixes_string_mismatch() {
        // Stored flags came from a plain string comparison
        let original = ResultsFile {
            model: "model-a".to_string(),
            accuracy: 0.0,
            results: vec![EvaluationResult {
                sample_id: 0,
                ground_truth: "p^(1/4) * log2(p)^(1)".to_string(),
                prediction: "log2(p)*p^(1/4)".to_string(),
                correct: false,
            }],
        };
        let rescored = original.rescore();
        assert!(rescored.results[0].correct);
        assert!((rescored.accuracy - 100.0).abs() < f64::EPSILON);
        assert!(!original.results[0].correct);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deepseek.json");
        let file = ResultsFile::new("deepseek-chat", vec![EvaluationResult::judge(0, "p", "p")]);
        file.save(&path).unwrap();

        let loaded = ResultsFile::load(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_load_uses_file_stem_without_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qwen3.json");
        std::fs::write(&path, r#"{"results": []}"#).unwrap();
        assert_eq!(ResultsFile::load(&path).unwrap().model, "qwen3");
    }

    #[test]
    fn test_load_not_found() {
        assert!(matches!(
            ResultsFile::load("/nonexistent/results.json"),
            Err(ResultsError::NotFound(_))
        ));
    }

    #[test]
    fn test_wire_format_uses_id() {
        let json = serde_json::to_string(&EvaluationResult::judge(7, "p", "p")).unwrap();
        assert!(json.contains("\"id\":7"));
    }
}
