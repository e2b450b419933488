//! Complexity Eval CLI
//!
//! Dataset sampling and LLM complexity-prediction scoring

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use complexity_eval::{
    aggregate, parse, AccuracySummary, BalancedSampler, Dataset, ExperimentConfig,
    MeasurementCase, ReportBuilder, ResultsFile, SamplingSettings, SecondPassPriority, SplitRatios, StatConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "complexity-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a dataset from raw Extra-P measurement files
    Generate {
        /// Measurement data root (holds case_1/ and case_2/)
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Which case to ingest: 1, 2 or all
        #[arg(long, default_value = "all")]
        case: MeasurementCase,

        /// Output dataset file
        #[arg(long, default_value = "dataset.json")]
        output: PathBuf,
    },

    /// Draw a reproducible evaluation subset from a dataset
    Sample {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Number of samples to draw (overrides config)
        #[arg(long)]
        target: Option<usize>,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Balance across complexity classes instead of stratifying by size
        #[arg(long)]
        balanced: bool,

        /// Second-pass priority for balanced sampling: ratio or absolute
        #[arg(long)]
        priority: Option<SecondPassPriority>,

        /// Experiment configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the sampled dataset here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the complexity class distribution of a dataset
    Stats {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Number of classes to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Split a dataset into train/val/test files
    Split {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Training set ratio
        #[arg(long, default_value = "0.8")]
        train: f64,

        /// Validation set ratio
        #[arg(long, default_value = "0.1")]
        val: f64,

        /// Test set ratio
        #[arg(long, default_value = "0.1")]
        test: f64,

        /// Random seed for splitting
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Compare a predicted label against ground truth
    Check {
        /// Predicted complexity (raw LLM answer accepted)
        predicted: String,

        /// Ground-truth complexity
        ground_truth: String,
    },

    /// Score a results file overall and per class
    Score {
        /// Results JSON file
        #[arg(long)]
        results: PathBuf,

        /// Re-judge predictions with the canonical comparator
        #[arg(long)]
        rescore: bool,

        /// Write the rescored results here
        #[arg(long, requires = "rescore")]
        output: Option<PathBuf>,
    },

    /// Build a comparison report from several results files
    Compare {
        /// Results files (glob pattern)
        #[arg(long, default_value = "results/*.json")]
        results: String,

        /// Re-judge predictions with the canonical comparator
        #[arg(long)]
        rescore: bool,

        /// Experiment configuration (YAML) for statistics settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output report file (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value = "markdown")]
        format: ReportFormat,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Option<ExperimentConfig>> {
    path.map(|p| {
        ExperimentConfig::load(p).with_context(|| format!("Failed to load config {}", p.display()))
    })
    .transpose()
}

#[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Generate {
            data_dir,
            case,
            output,
        } => {
            tracing::info!(data_dir = %data_dir.display(), ?case, "Generating dataset");
            let data = Dataset::from_measurements(&data_dir, case).with_context(|| {
                format!("Failed to build dataset from {}", data_dir.display())
            })?;

            println!("Total samples: {}", data.len());
            println!("Complexity classes: {}", data.num_classes());
            data.save(&output, None)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {} samples to {}", data.len(), output.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sample {
            dataset,
            target,
            seed,
            balanced,
            priority,
            config,
            output,
        } => {
            // Without a config file the default mode is stratified
            let mut settings = load_config(config.as_ref())?.map_or_else(
                || SamplingSettings {
                    balanced: false,
                    ..SamplingSettings::default()
                },
                |c| c.sampling,
            );
            if let Some(target) = target {
                settings.target_total = target;
            }
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            if let Some(priority) = priority {
                settings.priority = priority;
            }
            settings.balanced |= balanced;

            tracing::info!(
                dataset = %dataset.display(),
                target = settings.target_total,
                seed = settings.seed,
                balanced = settings.balanced,
                priority = ?settings.priority,
                "Sampling dataset"
            );

            let data = Dataset::load(&dataset)
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            let available = data.distribution();
            let subset = BalancedSampler::with_config(settings.sampler_config())
                .sample(&data, settings.target_total)?;

            println!(
                "Created {} sample: {} samples",
                if settings.balanced { "BALANCED" } else { "STRATIFIED" },
                subset.total()
            );
            println!("Classes covered: {} / {}", subset.classes.len(), available.len());
            if subset.shortfall {
                println!(
                    "Warning: requested {} but dataset only has {}",
                    settings.target_total,
                    data.len()
                );
            }
            println!("{:<55} {:>6} {:>10}", "Class", "Count", "Available");
            for (label, total) in &available {
                let count = subset.count(label);
                if count > 0 {
                    println!("{label:<55} {count:>6} / {total:>6}");
                }
            }

            if let Some(output) = output {
                subset
                    .into_dataset(settings.seed)
                    .save(&output, Some(settings.balanced))
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Saved to {}", output.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stats { dataset, top } => {
            let data = Dataset::load(&dataset)
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            let dist = data.distribution();

            println!("Dataset Statistics");
            println!("==================");
            println!("Path: {}", dataset.display());
            println!("Total samples: {}", data.len());
            println!("Complexity classes: {}", dist.len());
            println!();
            println!("Top {} classes:", top.min(dist.len()));
            for (label, count) in dist.iter().take(top) {
                let share = 100.0 * *count as f64 / data.len() as f64;
                println!("  {label}: {count} ({share:.1}%)");
            }
            if dist.len() > top {
                println!("  ... and {} more", dist.len() - top);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Split {
            dataset,
            output,
            train,
            val,
            test,
            seed,
        } => {
            let data = Dataset::load(&dataset)
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            let split = data.split(SplitRatios { train, val, test }, seed)?;

            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            split.train.save(output.join("train.json"), None)?;
            split.val.save(output.join("val.json"), None)?;
            split.test.save(output.join("test.json"), None)?;

            println!(
                "Split: train={}, val={}, test={}",
                split.train.len(),
                split.val.len(),
                split.test.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            predicted,
            ground_truth,
        } => {
            let extracted = complexity_eval::extract_label(&predicted);
            let show = |label: &str| {
                parse(label).map_or_else(|e| format!("unparseable ({e})"), |expr| expr.to_string())
            };
            println!("Predicted:    {}", show(&extracted));
            println!("Ground truth: {}", show(&ground_truth));

            if complexity_eval::compare(&extracted, &ground_truth) {
                println!("MATCH");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("NO MATCH");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Score {
            results,
            rescore,
            output,
        } => {
            let mut file = ResultsFile::load(&results)
                .with_context(|| format!("Failed to load results {}", results.display()))?;
            if rescore {
                file = file.rescore();
            }

            let summary = aggregate(&file.results);
            print_summary(&file, &summary);

            if let Some(output) = output {
                file.save(&output)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Saved to {}", output.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare {
            results,
            rescore,
            config,
            output,
            format,
        } => {
            let stat_config = load_config(config.as_ref())?
                .unwrap_or_default()
                .stat_config();
            tracing::info!(results = %results, rescore, "Generating comparison report");

            let report = ReportBuilder::new("LLM Complexity Prediction Comparison")
                .with_stat_config(stat_config)
                .with_rescore(rescore)
                .load_glob(&results)?
                .build();

            let rendered = match format {
                ReportFormat::Json => report.to_json()?,
                ReportFormat::Markdown => report.to_markdown(),
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => println!("{rendered}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(file: &ResultsFile, summary: &AccuracySummary) {
    let percent = |tally: &complexity_eval::ClassAccuracy| {
        tally
            .accuracy()
            .map_or_else(|| "-".to_string(), |a| format!("{:.1}%", a * 100.0))
    };

    println!("Model: {}", file.model);
    println!(
        "Overall: {}/{} = {}",
        summary.overall.correct,
        summary.overall.total,
        percent(&summary.overall)
    );
    if summary.overall.total > 0 {
        let (lower, upper) =
            AccuracySummary::confidence_interval(&file.results, &StatConfig::default());
        println!("95% CI: [{:.1}%, {:.1}%]", lower * 100.0, upper * 100.0);
    }
    println!();
    println!("Per-class accuracy:");
    for (label, tally) in &summary.per_class {
        println!(
            "  {label:<40} {:>4}/{:<4} ({})",
            tally.correct,
            tally.total,
            percent(tally)
        );
    }
}
