use anyhow::{bail, Context, Result};
use clap::Parser;
use csv::Writer;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taxi_dest::config::{DEFAULT_K, DEFAULT_REFERENCE_LATITUDE};
use taxi_dest::{BatchReport, Layout, PredictConfig, Table, WeightVector};

#[derive(Parser, Debug)]
#[command(name = "predict")]
#[command(about = "Predict trip destinations for a test CSV with k-nearest-neighbours over a training CSV.", long_about = None)]
struct Cli {
    /// Path to the training .csv file (completed trips)
    #[arg(long)]
    train: String,

    /// Path to the test .csv file (same columns as the training file)
    #[arg(long)]
    test: String,

    /// Number of neighbours
    #[arg(short, long, default_value_t = DEFAULT_K)]
    k: usize,

    /// Column weight as NAME=VALUE; repeat for several columns. Defaults to
    /// DAY_HOUR, LON_START and LAT_START with weight 1.
    #[arg(short, long = "weight")]
    weights: Vec<String>,

    /// Compare raw column values instead of standardizing them
    #[arg(long, default_value_t = false)]
    no_scale: bool,

    /// Latitude (degrees) whose cosine compresses longitude differences
    #[arg(long, default_value_t = DEFAULT_REFERENCE_LATITUDE)]
    reference_latitude: f64,

    /// "score" for standardized residuals, "range" for kilometre errors
    #[arg(short, long, default_value_t = String::from("score"))]
    mode: String,

    /// Only report rows of this trip id
    #[arg(long)]
    trip: Option<String>,

    /// Keep going when a test row cannot be predicted
    #[arg(long, default_value_t = false)]
    skip_failed: bool,

    /// Output CSV. If omitted, prints a summary to stdout.
    #[arg(short, long)]
    out: Option<String>,
}

enum ReportMode {
    Score,
    Range,
}

impl ReportMode {
    fn from(string: &str) -> Result<Self> {
        match string {
            "score" => Ok(ReportMode::Score),
            "range" => Ok(ReportMode::Range),
            _ => bail!(
                "Report mode not found for input string: {}, possible options are: (\"score\", \"range\")",
                string
            ),
        }
    }
}

fn emit<T: Serialize>(report: &BatchReport<T>, out: Option<&str>, skip_failed: bool) -> Result<()> {
    if let Some(failure) = report.failures.first() {
        if !skip_failed {
            bail!(
                "row {} (trip {}) failed: {}; rerun with --skip-failed to ignore",
                failure.row,
                failure.trip_id,
                failure.error
            );
        }
    }

    if let Some(out_path) = out {
        let mut wtr =
            Writer::from_path(out_path).with_context(|| format!("creating CSV {}", out_path))?;
        for row in &report.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        info!(rows = report.rows.len(), path = %out_path, "wrote predictions");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mode = ReportMode::from(&cli.mode)?;

    let weights = if cli.weights.is_empty() {
        WeightVector::default()
    } else {
        WeightVector::parse_all(&cli.weights)?
    };
    let config = PredictConfig {
        k: cli.k,
        weights,
        scale: !cli.no_scale,
        reference_latitude: cli.reference_latitude,
    };

    let layout = Layout::default();
    let train = Table::from_path(&cli.train, &layout)
        .with_context(|| format!("loading training table {}", &cli.train))?;
    let mut test = Table::from_path(&cli.test, &layout)
        .with_context(|| format!("loading test table {}", &cli.test))?;
    if let Some(trip_id) = &cli.trip {
        test = test.trip(trip_id);
        if test.is_empty() {
            bail!("trip {} not found in {}", trip_id, &cli.test);
        }
    }
    info!(train = train.len(), test = test.len(), k = config.k, "tables loaded");

    let summary = match mode {
        ReportMode::Score => {
            let report = taxi_dest::score(&train, &test, &config)?;
            emit(&report, cli.out.as_deref(), cli.skip_failed)?;
            report.summary()
        }
        ReportMode::Range => {
            let report = taxi_dest::range(&train, &test, &config)?;
            emit(&report, cli.out.as_deref(), cli.skip_failed)?;
            report.summary()
        }
    };

    println!("Rows predicted: {}", summary.rows);
    println!("Rows failed: {}", summary.failures);
    println!("Rows with known destination: {}", summary.scored);
    if let Some(mean) = summary.mean_error {
        match mode {
            ReportMode::Score => println!("Mean standardized error: {:.4}", mean),
            ReportMode::Range => println!("Mean error (km): {:.3}", mean),
        }
    }

    Ok(())
}
