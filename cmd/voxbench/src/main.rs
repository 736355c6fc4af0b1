//! voxbench - Runs speaker recognition experiment schedules.

mod schedule;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use voxid_engine::{save_report, Report, SampleSource, TestEngine, TextSampleSource};
use voxid_recognizer::{Recognizer, VqRecognizer};

use crate::schedule::Run;

/// Runs speaker identification and verification experiments.
#[derive(Parser, Debug)]
#[command(name = "voxbench")]
#[command(about = "Run speaker identification and verification experiment schedules")]
struct Args {
    /// Experiment schedule (YAML)
    schedule: PathBuf,

    /// Directory for JSON reports, one file per run
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Quiet mode (no summaries)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else if !args.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .init();
    }

    let schedule = schedule::load(&args.schedule)?;
    let source = TextSampleSource::new();

    let speakers = source
        .load(&schedule.root, schedule.speakers.start, schedule.speakers.count)
        .context("failed to load enrolled speakers")?;
    let background = match schedule.background {
        Some(range) => Some(
            source
                .load(&schedule.root, range.start, range.count)
                .context("failed to load background speakers")?,
        ),
        None => None,
    };

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let engine = TestEngine::new(Box::new(source));

    // One recognizer for the whole schedule, so a background model trained
    // by an earlier run can be reused by later runs.
    let mut recognizer = VqRecognizer::new(Default::default());
    recognizer.set_speaker_data(Arc::new(speakers));
    if let Some(bg) = background {
        recognizer.set_background_data(Arc::new(bg));
    }

    let mut failed_cycles = 0;
    for (i, run) in schedule.runs.iter().enumerate() {
        recognizer.reconfigure(run.config().clone());
        match run {
            Run::Recognize { params, .. } => {
                let report = engine
                    .recognize(&schedule.root, &mut recognizer, params)
                    .with_context(|| format!("run {i} failed"))?;
                failed_cycles += finish(&report, &args)?;
            }
            Run::Verify { params, .. } => {
                let report = engine
                    .verify(&schedule.root, &mut recognizer, params)
                    .with_context(|| format!("run {i} failed"))?;
                failed_cycles += finish(&report, &args)?;
            }
        }
    }

    if failed_cycles > 0 {
        eprintln!("Warning: {failed_cycles} cycle(s) failed, see reports for details");
    }
    Ok(())
}

/// Prints and saves one report. Returns its failed cycle count.
fn finish<R: Report>(report: &R, args: &Args) -> Result<usize> {
    if !args.quiet {
        report.print_summary();
    }
    if let Some(dir) = &args.output {
        let path = report_path(dir, report.id());
        save_report(report, &path)?;
        if !args.quiet {
            println!("Report saved to {}", path.display());
        }
    }
    Ok(report.failed_cycles())
}

fn report_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}
