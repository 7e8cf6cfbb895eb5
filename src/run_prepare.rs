use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use tracing_subscriber::EnvFilter;

use taxi_dest::prepare::{prepare, summarize, Excuse, PrepareOptions};

#[derive(Parser, Debug)]
#[command(name = "prepare")]
#[command(about = "Flatten the raw taxi trip CSV (one POLYLINE per trip) into a feature table for prediction.", long_about = None)]
struct Cli {
    /// Path to the raw .csv file
    #[arg(short, long)]
    input: String,

    /// Path of the prepared .csv file to write
    #[arg(short, long)]
    out: String,

    /// Stop after this many sampled trips (0 = all)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Keep every n-th trip, e.g. 100 for a 1% sample
    #[arg(short, long, default_value_t = 1)]
    sample: usize,

    /// Also write trips rejected as outliers
    #[arg(long, default_value_t = false)]
    keep_outliers: bool,

    /// Write a per-trip summary (distances in km, time) instead of the feature table
    #[arg(long, default_value_t = false)]
    summary: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = PrepareOptions {
        limit: cli.limit,
        sample: cli.sample,
        keep_outliers: cli.keep_outliers,
    };

    let source = File::open(&cli.input).with_context(|| format!("opening {}", &cli.input))?;
    let target = File::create(&cli.out).with_context(|| format!("creating CSV {}", &cli.out))?;
    if cli.summary {
        let written = summarize(source, BufWriter::new(target), &options)
            .with_context(|| format!("summarizing {}", &cli.input))?;
        println!("Wrote {} trip summaries to {}", written, cli.out);
        return Ok(());
    }

    let stats = prepare(source, BufWriter::new(target), &options)
        .with_context(|| format!("preparing {}", &cli.input))?;

    println!("Trips read: {}", stats.read);
    println!("- {} accepted", stats.accepted);
    for excuse in Excuse::ALL {
        println!("- {} ignored: {}", stats.rejected(excuse), excuse);
    }
    println!("Wrote {} trips to {}", stats.written, cli.out);

    Ok(())
}
