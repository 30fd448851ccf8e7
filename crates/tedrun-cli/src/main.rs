//! tedrun - combine multi-echo BOLD runs from fMRIPrep derivatives and
//! project them into T1w and MNI space.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tedrun_core::{telemetry, Processor};
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "tedrun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Multi-echo combination pipeline for fMRIPrep derivatives",
    long_about = None
)]
struct Cli {
    /// Path to the fMRIPrep derivatives directory
    #[arg(long)]
    fmriprep_dir: PathBuf,

    /// Output directory for combined and transformed derivatives
    #[arg(long)]
    output_dir: PathBuf,

    /// Subject ID to process ("01" and "sub-01" are equivalent)
    #[arg(long)]
    subj_id: String,

    /// Number of volumes to trim from the beginning of each echo
    #[arg(long, default_value = "0")]
    trim_by: u32,

    /// Apptainer image containing the ANTs tools
    #[arg(long)]
    apptainer_image: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let processor = Processor::with_command_tools(
        cli.fmriprep_dir,
        cli.output_dir,
        &cli.subj_id,
        cli.trim_by,
        cli.apptainer_image,
    );

    match processor.process().await {
        Ok(results) => {
            info!(runs = results.len(), "processing completed successfully");
            for (run_key, result) in &results {
                info!(run = %run_key, "run outputs");
                info!("  optcom: {}", result.combined.display());
                info!("  T1w:    {}", result.t1w.display());
                info!("  MNI:    {}", result.mni.display());
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, subject = processor.subject_id(), "processing failed");
            Err(e.into())
        }
    }
}
