//! Run a single member projection from a JSON assumptions file
//!
//! Prints a period table by default; `--format csv` writes period records,
//! `--events` writes the balance-change log as JSON lines.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use cpf_projection::projection::{CsvSink, JsonLinesSink, PeriodSink, StagedFile, TableSink};
use cpf_projection::{Assumptions, ProjectionEngine};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "run_projection")]
#[command(about = "Month-by-month projection of a CPF-style savings account")]
struct Args {
    /// Path to the JSON assumptions file
    #[arg(short, long)]
    config: PathBuf,

    /// Output format for period records
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Write period output here instead of stdout (required for csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write every balance event as JSON lines to this file
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Write the generated period schedule as CSV instead of projecting
    #[arg(long)]
    schedule_only: bool,
}

/// Stdout, or a file that only appears once the run succeeds
enum Destination {
    Stdout(io::Stdout),
    File(StagedFile),
}

impl Destination {
    fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => StagedFile::create(path)
                .map(Destination::File)
                .with_context(|| format!("Failed to create {}", path.display())),
            None => Ok(Destination::Stdout(io::stdout())),
        }
    }

    fn commit(self) -> io::Result<()> {
        match self {
            Destination::Stdout(mut out) => out.flush(),
            Destination::File(mut file) => file.commit(),
        }
    }
}

impl Write for Destination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Destination::Stdout(out) => out.write(buf),
            Destination::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Destination::Stdout(out) => out.flush(),
            Destination::File(file) => file.flush(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let assumptions = Assumptions::load(&args.config)
        .with_context(|| format!("Failed to load assumptions from {}", args.config.display()))?;

    if args.schedule_only {
        return write_schedule(&assumptions, args.output.as_deref());
    }

    let mut table = None;
    let mut csv_sink = None;
    let mut json = None;
    match args.format {
        OutputFormat::Table => {
            table = Some(TableSink::new(Destination::open(args.output.as_deref())?));
        }
        OutputFormat::Csv => {
            let Some(path) = args.output.as_deref() else {
                bail!("--format csv requires --output <path>");
            };
            csv_sink = Some(
                CsvSink::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
            );
        }
        OutputFormat::Json => {
            json = Some(JsonLinesSink::new(Destination::open(args.output.as_deref())?));
        }
    }

    let mut event_log = match args.events.as_deref() {
        Some(path) => Some(JsonLinesSink::new(Destination::open(Some(path))?)),
        None => None,
    };

    let result = {
        let mut sinks: Vec<&mut dyn PeriodSink> = Vec::new();
        if let Some(sink) = table.as_mut() {
            sinks.push(sink);
        }
        if let Some(sink) = csv_sink.as_mut() {
            sinks.push(sink);
        }
        if let Some(sink) = json.as_mut() {
            sinks.push(sink);
        }
        if let Some(sink) = event_log.as_mut() {
            sinks.push(sink);
        }

        let engine = ProjectionEngine::new(&assumptions);
        engine.run(&mut sinks).context("Projection failed")?
    };

    // Every sink finished cleanly; move staged files into place
    if let Some(sink) = table {
        sink.into_inner().commit().context("Failed to write table output")?;
    }
    if let Some(sink) = csv_sink {
        let mut staged = sink.into_staged().context("Failed to flush CSV output")?;
        staged.commit().context("Failed to write CSV output")?;
        log::info!("Wrote {}", staged.path().display());
    }
    if let Some(sink) = json {
        sink.into_inner().commit().context("Failed to write JSON output")?;
    }
    if let Some(sink) = event_log {
        let written = sink.events_written();
        sink.into_inner().commit().context("Failed to write event log")?;
        eprintln!("Wrote {} balance events", written);
    }

    eprintln!("{}", result.summary(assumptions.salary));
    eprintln!("Total time: {:?}", start.elapsed());
    Ok(())
}

/// Period start, period end and age for every generated month
fn write_schedule(assumptions: &Assumptions, output: Option<&Path>) -> Result<()> {
    let schedule = assumptions.schedule()?;

    let mut writer = csv::Writer::from_writer(Destination::open(output)?);
    for period in schedule.periods() {
        writer.serialize(period)?;
    }
    writer.flush()?;
    let destination = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush schedule")?;
    destination.commit().context("Failed to write schedule")?;

    eprintln!("{} periods from {} to {}", schedule.len(), assumptions.start_date, assumptions.end_date);
    Ok(())
}
