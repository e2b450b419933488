//! # Complexity Eval
//!
//! Scoring toolkit for LLM predictions of asymptotic complexity in MPI
//! applications, checked against Extra-P empirical performance models.
//!
//! ## Pipeline
//!
//! ```text
//! Raw Extra-P measurements (call_path.txt + complexity files)
//!        ↓
//! Labeled dataset (call path + Extra-P ground truth)
//!        ↓
//! Balanced class sampling (seeded, reproducible)
//!        ↓
//! LLM queries (external driver)
//!        ↓
//! Canonical label comparison (exact rational exponents)
//!        ↓
//! Overall / per-class accuracy with bootstrap CI
//!        ↓
//! Multi-model comparison report
//! ```
//!
//! ## Example
//!
//! ```
//! use complexity_eval::compare;
//!
//! assert!(compare("n^(3/2)", "n^1.5"));
//! assert!(compare("p^(1/4) * log2(p)", "log2(p)*p^(1/4)"));
//! assert!(!compare("garbage(((", "n^1"));
//! ```

pub mod complexity;
pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod metrics;
pub mod report;
pub mod sampler;

pub use complexity::{compare, extract_label, parse, Base, ComplexityExpr, ParseError, Rational};
pub use config::{ConfigError, ExperimentConfig, SamplingSettings, StatisticsSettings};
pub use dataset::{
    Dataset, DatasetError, DatasetMetadata, DatasetSplit, MeasurementCase, ParameterRanges, Sample,
    SplitRatios,
};
pub use evaluation::{EvaluationResult, ResultsError, ResultsFile};
pub use metrics::{
    aggregate, bonferroni_correction, bootstrap_ci, paired_t_test, welch_t_test,
    AccuracySummary, ClassAccuracy, SignificanceResult, StatConfig,
};
pub use report::{ComparisonReport, ModelReport, ReportBuilder, ReportError};
pub use sampler::{
    sample, BalancedSampler, SampledSubset, SamplerConfig, SamplerError, SamplingMode,
    SecondPassPriority,
};
