//! Command-line front end of the report generation pipeline.
//!
//! Usage:
//! ```text
//! cxr-mrg --config mrg.json [--device cpu|cuda|cuda:N] [--scores] [--save] <IMAGE>...
//! ```
//!
//! Prints one report per image. `--scores` appends the per-disease scores,
//! `--save` stores the image and report under the configured assets directory
//! with a fresh request id.

use clap::Parser;
use cxr_mrg::core::config::MrgConfig;
use cxr_mrg::core::{MrgResult, init_tracing};
use cxr_mrg::pipeline::MrgPipeline;
use cxr_mrg::service::ArtifactStore;
use cxr_mrg::utils::parse_device;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use uuid::Uuid;

/// Command-line arguments
#[derive(Parser)]
#[command(name = "cxr-mrg")]
#[command(about = "Generates chest X-ray reports from radiograph images")]
struct Args {
    /// Pipeline configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Device for the classifier: cpu, cuda or cuda:N
    #[arg(short, long, default_value = "cpu")]
    device: String,

    /// Print per-disease scores after each report
    #[arg(long)]
    scores: bool,

    /// Store image and report under the assets directory
    #[arg(long)]
    save: bool,

    /// Image files to process
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn save(store: &ArtifactStore, path: &Path, report: &str) -> MrgResult<String> {
    let id = Uuid::new_v4().to_string();
    let bytes = std::fs::read(path)?;
    store.save_image(&id, &bytes)?;
    store.save_report(&id, report)?;
    Ok(id)
}

fn run(args: &Args) -> MrgResult<usize> {
    let cfg = MrgConfig::from_path(&args.config)?;
    let device = parse_device(&args.device)?;
    let pipeline = MrgPipeline::from_config(&cfg, &device)?;
    let store = ArtifactStore::new(&cfg.assets_dir);

    let mut failures = 0;
    for (path, result) in args.images.iter().zip(pipeline.analyze_many(&args.images)) {
        println!("== {}", path.display());
        let parts = match result {
            Ok(parts) => parts,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };
        let report = parts.compose();
        println!("{report}");

        if args.scores {
            match pipeline.translator().score_summary(&parts.probabilities) {
                Ok(scores) => println!("{scores}"),
                Err(e) => error!("{}: scores unavailable: {}", path.display(), e),
            }
        }
        if args.save {
            match save(&store, path, &report) {
                Ok(id) => info!("saved {} as request {}", path.display(), id),
                Err(e) => error!("{}: saving failed: {}", path.display(), e),
            }
        }
    }
    Ok(failures)
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            error!("{} of {} image(s) failed", failures, args.images.len());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
