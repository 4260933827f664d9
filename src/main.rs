// main.rs
// Runs every statistics pipeline declared in the configuration file and
// prints a per-source summary.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use sdp_data_prep::config::PrepConfig;
use sdp_data_prep::pipeline::{self, PreparedStatistics};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sdp_data_prep", about = "Prepares country and zone statistics for the data portal")]
struct Args {
    /// Pipeline configuration file
    #[arg(default_value = "sdp.toml")]
    config: PathBuf,

    /// Run only the pipeline with this name
    #[arg(short, long)]
    pipeline: Option<String>,
}

/// One line of the end-of-run summary.
#[derive(Debug)]
struct RunSummary {
    /// Pipeline name from the config.
    name: String,
    rows: usize,
    /// `first-last` year of the output.
    years: String,
    countries: usize,
    skipped_rows: usize,
    dropped_countries: usize,
    warnings: usize,
}

impl RunSummary {
    fn new(name: &str, prepared: &PreparedStatistics) -> Self {
        Self {
            name: name.to_string(),
            rows: prepared.table.len(),
            years: prepared.overview.year_span(),
            countries: prepared.overview.countries,
            skipped_rows: prepared.load.skipped_rows + prepared.cells_dropped + prepared.labels_dropped,
            dropped_countries: prepared.resolution.dropped_rows,
            warnings: prepared.warnings.len(),
        }
    }
}

/// Displays one line per pipeline.
fn display_summary(data: &[RunSummary]) {
    println!(
        "{:<30} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Pipeline", "Rows", "Years", "Countries", "Skipped", "Dropped", "Warnings"
    );
    println!("{}", "-".repeat(96));

    for item in data {
        println!("{}", summary_line(item));
    }
}

fn summary_line(item: &RunSummary) -> String {
    format!(
        "{:<30} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        item.name,
        item.rows,
        item.years,
        item.countries,
        item.skipped_rows,
        item.dropped_countries,
        item.warnings
    )
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

/// Main program entry point:
/// - Loads the pipeline configuration (`sdp.toml` by default)
/// - Runs each pipeline in order, stopping at the first fatal error
/// - Prints a summary of rows written, coverage and rows dropped
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();

    let config = PrepConfig::load(&args.config)?;
    let selected: Vec<_> = config
        .pipelines
        .iter()
        .filter(|p| args.pipeline.as_ref().is_none_or(|name| &p.name == name))
        .collect();
    if let Some(name) = &args.pipeline {
        if selected.is_empty() {
            return Err(format!("no pipeline named `{name}` in {}", args.config.display()).into());
        }
    }

    let mut summaries = Vec::with_capacity(selected.len());
    for pipeline_config in selected {
        match pipeline::run(pipeline_config) {
            Ok(prepared) => summaries.push(RunSummary::new(&pipeline_config.name, &prepared)),
            Err(e) => {
                error!(pipeline = %pipeline_config.name, "pipeline failed: {e}");
                return Err(e.into());
            }
        }
    }

    println!();
    display_summary(&summaries);
    Ok(())
}
