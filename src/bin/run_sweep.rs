//! Run the same assumptions across several salaries in parallel
//!
//! Each scenario gets its own assumptions and ledger; one summary row is
//! printed (or written as CSV) per salary.

use anyhow::{Context, Result};
use clap::Parser;
use cpf_projection::projection::{ProjectionSummary, StagedFile};
use cpf_projection::{Assumptions, ProjectionEngine};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "run_sweep")]
#[command(about = "Project one account under several monthly salaries")]
struct Args {
    /// Path to the JSON assumptions file
    #[arg(short, long)]
    config: PathBuf,

    /// Comma-separated monthly salaries, e.g. 4000,6000,8000
    #[arg(short, long, value_delimiter = ',', required = true)]
    salaries: Vec<f64>,

    /// Write the summaries as CSV to this path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let base = Assumptions::load(&args.config)
        .with_context(|| format!("Failed to load assumptions from {}", args.config.display()))?;

    println!("Running {} salary scenarios...", args.salaries.len());

    let summaries: Vec<ProjectionSummary> = args
        .salaries
        .par_iter()
        .map(|salary| {
            let assumptions = base.with_salary(*salary);
            let engine = ProjectionEngine::new(&assumptions);
            engine
                .run(&mut [])
                .map(|result| result.summary(*salary))
                .with_context(|| format!("Projection failed for salary {:.2}", salary))
        })
        .collect::<Result<_>>()?;

    println!("Projections complete in {:?}", start.elapsed());

    for summary in &summaries {
        println!("{}", summary);
    }

    if let Some(path) = args.output.as_ref() {
        let mut staged = StagedFile::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        {
            let mut writer = csv::Writer::from_writer(&mut staged);
            for summary in &summaries {
                writer.serialize(summary)?;
            }
            writer.flush()?;
        }
        staged.commit()?;
        println!("Output written to {}", path.display());
    }

    Ok(())
}
