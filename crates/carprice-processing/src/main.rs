//! CLI entry point for the car price pipeline.

use anyhow::{Result, anyhow};
use carprice_processing::cleaner::read_listings_csv;
use carprice_processing::{
    FittedArtifacts, HandleUnknown, Pipeline, PipelineConfig, RawRecord, TrainingSummary,
};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use polars::prelude::*;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable holding the default artifact directory.
const ARTIFACTS_DIR_ENV: &str = "CARPRICE_ARTIFACTS_DIR";
const DEFAULT_ARTIFACTS_DIR: &str = "./artifacts";

/// Rows scanned to infer the types of the non-textual columns.
const INFER_SCHEMA_ROWS: usize = 1000;

/// CLI-compatible unknown category policy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliHandleUnknown {
    /// Reject records with unseen categories
    Error,
    /// Encode unseen one-hot categories as all zeros
    Ignore,
}

impl From<CliHandleUnknown> for HandleUnknown {
    fn from(cli: CliHandleUnknown) -> Self {
        match cli {
            CliHandleUnknown::Error => HandleUnknown::Error,
            CliHandleUnknown::Ignore => HandleUnknown::Ignore,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Used-car price feature pipeline",
    long_about = "Cleans car listings, fits feature encoders and scores vehicles.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  CARPRICE_ARTIFACTS_DIR    Default artifact directory (./artifacts)\n  \
                  RUST_LOG                  Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Fit encoders on a dataset\n  \
                  carprice preprocess -i car_price_prediction.csv -o out/\n\n  \
                  # Score a record\n  \
                  carprice predict -r car.json"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a training dataset and fit (or reuse) encoders
    Preprocess {
        /// Path to the CSV dataset
        #[arg(short, long)]
        input: String,

        /// Output directory for cleaned data, features and encoders
        #[arg(short, long, default_value = "./outputs")]
        output: String,

        /// Encode with the encoders in this directory instead of fitting new ones
        #[arg(short, long)]
        artifacts: Option<String>,

        /// JSON pipeline configuration; the flags below override it
        #[arg(short, long)]
        config: Option<String>,

        /// Year used to compute Age (defaults to the current year)
        #[arg(long)]
        reference_year: Option<i32>,

        /// IQR multiplier for outlier bounds [default: 1.5]
        #[arg(long)]
        iqr_multiplier: Option<f64>,

        /// Keep exact duplicate rows
        #[arg(long)]
        keep_duplicates: bool,

        /// Policy for one-hot categories unseen at fit time [default: error]
        #[arg(long, value_enum)]
        handle_unknown: Option<CliHandleUnknown>,

        /// Print the training summary as JSON instead of a human-readable report
        #[arg(long)]
        json: bool,
    },

    /// Predict prices for one record or an array of records
    Predict {
        /// JSON file with a record or an array of records (stdin if omitted)
        #[arg(short, long)]
        record: Option<String>,

        /// Artifact directory (defaults to $CARPRICE_ARTIFACTS_DIR)
        #[arg(short, long)]
        artifacts: Option<String>,

        /// Year used to compute Age (defaults to the current year)
        #[arg(long)]
        reference_year: Option<i32>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file
    dotenv().ok();

    init_logging(&args.log_level, args.quiet);

    match args.command {
        Command::Preprocess {
            input,
            output,
            artifacts,
            config,
            reference_year,
            iqr_multiplier,
            keep_duplicates,
            handle_unknown,
            json,
        } => {
            let mut config = match config {
                Some(path) => {
                    info!("Loading configuration from: {}", path);
                    PipelineConfig::from_json_file(&path)?
                }
                None => PipelineConfig::default(),
            };
            if reference_year.is_some() {
                config.reference_year = reference_year;
            }
            if let Some(multiplier) = iqr_multiplier {
                config.iqr_multiplier = multiplier;
            }
            if keep_duplicates {
                config.remove_duplicates = false;
            }
            if let Some(policy) = handle_unknown {
                config.handle_unknown = policy.into();
            }
            config.validate()?;
            run_preprocess(&input, &output, artifacts.as_deref(), config, json)
        }
        Command::Predict {
            record,
            artifacts,
            reference_year,
        } => {
            let mut builder = PipelineConfig::builder();
            if let Some(year) = reference_year {
                builder = builder.reference_year(year);
            }
            let config = builder.build()?;
            run_predict(record.as_deref(), artifacts, config)
        }
    }
}

fn run_preprocess(
    input: &str,
    output: &str,
    artifacts: Option<&str>,
    config: PipelineConfig,
    json: bool,
) -> Result<()> {
    if !Path::new(input).exists() {
        return Err(anyhow!("Input file not found: {}", input));
    }

    info!("Loading dataset from: {}", input);
    let data = read_listings_csv(input, Some(INFER_SCHEMA_ROWS))?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let pipeline = Pipeline::builder()
        .config(config)
        .on_progress(|update| {
            debug!("[{:.0}%] {}", update.progress * 100.0, update.message);
        })
        .build()?;

    let mut result = match artifacts {
        Some(dir) => {
            let fitted = FittedArtifacts::load(dir)?;
            pipeline.run_training_with(data, &fitted)?
        }
        None => pipeline.run_training(data)?,
    };

    let output_dir = PathBuf::from(output);
    std::fs::create_dir_all(&output_dir)?;
    write_csv(&mut result.cleaned, &output_dir.join("cleaned.csv"))?;
    write_csv(&mut result.features, &output_dir.join("features.csv"))?;
    let encoders_dir = output_dir.join("encoders");
    result.encoders.save(&encoders_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
    } else {
        print_summary(&result.summary, &output_dir);
    }
    Ok(())
}

fn run_predict(record: Option<&str>, artifacts: Option<String>, config: PipelineConfig) -> Result<()> {
    let dir = artifacts
        .or_else(|| std::env::var(ARTIFACTS_DIR_ENV).ok())
        .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_string());
    let fitted = FittedArtifacts::load(&dir)?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let content = match record {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let payload: serde_json::Value = serde_json::from_str(&content)?;
    let response = match payload {
        serde_json::Value::Array(items) => {
            let records = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<RawRecord>, _>>()?;
            let results: Vec<serde_json::Value> = pipeline
                .predict_batch(&records, &fitted)
                .into_iter()
                .map(|result| match result {
                    Ok(prediction) => json!({ "prediction": prediction }),
                    Err(e) => json!({ "error": e }),
                })
                .collect();
            serde_json::Value::Array(results)
        }
        single => {
            let record: RawRecord = serde_json::from_value(single)?;
            match pipeline.predict(&record, &fitted) {
                Ok(prediction) => json!({ "prediction": prediction }),
                Err(e) if e.is_request_error() => json!({ "error": e }),
                Err(e) => return Err(e.into()),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    info!("Wrote {} ({} rows)", path.display(), df.height());
    Ok(())
}

/// Print a human-readable summary of a training run.
fn print_summary(summary: &TrainingSummary, output_dir: &Path) {
    println!();
    println!("{}", "=".repeat(80));
    println!("PREPROCESSING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Output: {}", output_dir.display());
    println!("Reference year: {}", summary.reference_year);
    println!("Duration: {}ms", summary.duration_ms);
    println!();
    println!("Rows:");
    println!("  Input:              {}", summary.rows_input);
    println!("  Duplicates removed: {}", summary.duplicates_removed);
    println!("  Outliers removed:   {}", summary.outliers.rows_removed());
    for pass in &summary.outliers.passes {
        println!(
            "    {:<16} [{:.2}, {:.2}] -{}",
            pass.column, pass.lower_bound, pass.upper_bound, pass.rows_removed
        );
    }
    println!("  Cleaned:            {}", summary.rows_cleaned);
    println!("  Encoded:            {}", summary.rows_encoded);
    println!("  Rejected:           {}", summary.rows_rejected);
    println!("{}", "=".repeat(80));
}
