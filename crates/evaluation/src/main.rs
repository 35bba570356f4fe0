mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracking_rs::{MultiObjectTracker, MultiObjectTrackerOptions};

/// Replay recorded detection and vision cycles through the tracker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The input path, a glob matching JSON lines scenario files
    #[arg(short, long)]
    input: String,

    /// The output directory, one CSV file is written per scenario
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// The tracking frame
    #[arg(short, long)]
    frame: Option<String>,

    /// Remove tracks not updated for this many seconds
    #[arg(long)]
    pruning_time: Option<f64>,

    /// Remove tracks not updated for this many detection cycles
    #[arg(long)]
    pruning_ticks: Option<usize>,

    /// A JSON file with the tracker options
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let options = options(&args)?;

    let files = glob::glob(&args.input)
        .with_context(|| format!("invalid input pattern {}", args.input))?
        .filter_map(|path| path.ok())
        .collect::<Vec<_>>();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.to_string_lossy()))?;

    files
        .iter()
        .try_for_each(|path| evaluate(path, &args.output, &options))
}

/// Build the tracker options from the config file and the command line overrides.
fn options(args: &Args) -> Result<MultiObjectTrackerOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
            serde_json::from_reader::<_, MultiObjectTrackerOptions>(BufReader::new(file))
                .with_context(|| format!("invalid config {}", path.to_string_lossy()))?
        }
        None => MultiObjectTrackerOptions::default(),
    };

    if let Some(frame) = &args.frame {
        options.with_frame(frame.as_str());
    }
    if let Some(pruning_time) = args.pruning_time {
        let pruning_time = Duration::try_from_secs_f64(pruning_time)
            .with_context(|| format!("invalid pruning time {}", pruning_time))?;
        options.with_pruning_time_threshold(pruning_time);
    }
    if let Some(pruning_ticks) = args.pruning_ticks {
        options.with_pruning_ticks_threshold(pruning_ticks);
    }
    options.validate().context("invalid tracker options")?;

    Ok(options)
}

/// Replay one scenario file into `<output>/<file stem>.csv`.
fn evaluate(path: &Path, output: &Path, options: &MultiObjectTrackerOptions) -> Result<()> {
    info!("{}", path.to_string_lossy());

    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    let events = scenario::read_events(BufReader::new(file))
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "scenario".to_string());
    let output_path = output.join(format!("{stem}.csv"));
    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("failed to create {}", output_path.to_string_lossy()))?;

    let mut tracker = MultiObjectTracker::new(options.clone());
    scenario::replay(&mut tracker, events, &mut writer)?;

    Ok(())
}
