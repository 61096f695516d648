//! # A/B test simulator CLI
//!
//! Generates (or loads) user-level data, splits it into variants A and B at a
//! fixed ratio, summarizes conversion per variant and runs a chi-square test
//! of independence between variant and conversion.
//!
//! * **Argument parsing** – `clap` derives [`Args`], which is turned into an
//!   explicit, validated [`RunConfig`].
//! * **Pipeline** – [`pipeline::run`] does one full, stateless recomputation.
//! * **Result presentation** – tables via `comfy_table` or a JSON document,
//!   plus an optional CSV export of the assigned data.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use abtest_sim::config::{
    DataSource, RunConfig, DEFAULT_VARIANT_A_NAME, DEFAULT_VARIANT_B_NAME,
};
use abtest_sim::summary::Attribute;
use abtest_sim::{pipeline, report};

#[derive(Parser, Debug)]
#[command(name = "abtest-sim", about = "Simulates an A/B test and checks it for significance.")]
struct Args {
    /// Number of synthetic users to generate (100-5000)
    #[arg(long, default_value_t = 1000, conflicts_with = "input")]
    users: usize,

    /// CSV file of user records instead of synthetic data
    #[arg(long)]
    input: Option<PathBuf>,

    /// Use the fixed seed (42) for generation and shuffling
    #[arg(long = "use-seed")]
    use_seed: bool,

    /// Percentage of users assigned to variant A (10-90, step 5)
    #[arg(long, default_value_t = 50)]
    split: u32,

    /// Display name of variant A
    #[arg(long = "variant-a-name", default_value = DEFAULT_VARIANT_A_NAME)]
    variant_a_name: String,

    /// Display name of variant B
    #[arg(long = "variant-b-name", default_value = DEFAULT_VARIANT_B_NAME)]
    variant_b_name: String,

    /// Also track `engaged` and `signed_up`
    #[arg(long)]
    extended: bool,

    /// Disable the Yates continuity correction on 2x2 tables
    #[arg(long = "no-correction")]
    no_correction: bool,

    /// Attribute to break down per variant
    #[arg(long, value_parser = ["location", "device"], default_value = "location")]
    distribution: String,

    /// Rows of assigned data to preview (0 disables the preview)
    #[arg(long, default_value_t = 100)]
    preview: usize,

    /// Write the assigned dataset as CSV
    #[arg(long, num_args = 0..=1, default_missing_value = report::EXPORT_FILE_NAME)]
    export: Option<PathBuf>,

    /// Output format
    #[arg(long, value_parser = ["table", "json"], default_value = "table")]
    format: String,

    /// Number of decimal places to round numbers when printing
    #[arg(long, default_value_t = 3)]
    round: usize,

    /// Trace-level logging on stderr
    #[arg(long)]
    debug: bool,
}

impl From<&Args> for RunConfig {
    fn from(args: &Args) -> Self {
        let source = match &args.input {
            Some(path) => DataSource::Csv(path.clone()),
            None => DataSource::Synthetic {
                num_users: args.users,
            },
        };
        RunConfig {
            source,
            split_percent: args.split,
            variant_a_name: args.variant_a_name.clone(),
            variant_b_name: args.variant_b_name.clone(),
            use_seed: args.use_seed,
            extended: args.extended,
            yates_correction: !args.no_correction,
            distribution: match args.distribution.as_str() {
                "device" => Attribute::Device,
                _ => Attribute::Location,
            },
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = RunConfig::from(&args);
    let run = pipeline::run(&config).context("simulation failed")?;

    match args.format.as_str() {
        "json" => println!("{}", report::render_json(&run)?),
        _ => print!("{}", report::render_text(&run, args.preview, args.round)),
    }

    if let Some(path) = &args.export {
        report::export_csv(&run, path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        eprintln!("Exported {} rows to {}", run.assigned.len(), path.display());
    }
    Ok(())
}
