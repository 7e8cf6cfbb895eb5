use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{stdout, BufWriter};
use tracing_subscriber::EnvFilter;

use taxi_dest::illume::{illume, IllumeOptions};

#[derive(Parser, Debug)]
#[command(name = "illume")]
#[command(about = "Print raw taxi trips in readable form, with waypoints, headings and speeds.", long_about = None)]
struct Cli {
    /// Path to the raw .csv file
    #[arg(short, long)]
    input: String,

    /// Number of trips to show; 0 shows a thinning selection from the whole file
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// First trip to show when --limit is not 0
    #[arg(short, long, default_value_t = 0)]
    start: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = IllumeOptions {
        limit: cli.limit,
        start: cli.start,
    };

    let source = File::open(&cli.input).with_context(|| format!("opening {}", &cli.input))?;
    let count = illume(source, BufWriter::new(stdout().lock()), &options)
        .with_context(|| format!("reading {}", &cli.input))?;
    println!("Trips scanned: {}", count);

    Ok(())
}
