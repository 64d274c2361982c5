//! Command-line pupil/LED tracker for eye-camera movies.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use pupil_led_tracker::config::DetectorParams;
use pupil_led_tracker::detector::PupilLedDetector;
use pupil_led_tracker::results::YamlResultsFile;
use pupil_led_tracker::tracker::{ContinuityPolicy, OutputPaths, Tracker, TrackerOptions};
use pupil_led_tracker::video::{FrameSink, NullSink, VideoFileSink, VideoFileSource};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Movie to track
    #[arg(required_unless_present = "write_default_config")]
    input: Option<PathBuf>,

    /// Detector parameter file (YAML); defaults to <stem>_output.yml next to the movie
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replace existing tracking results
    #[arg(long)]
    overwrite: bool,

    /// Pupil continuity after a missed frame (reset, carry-forward)
    #[arg(long, default_value = "reset")]
    continuity: ContinuityPolicy,

    /// Skip writing the annotated video
    #[arg(long)]
    no_video: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Write the default parameters to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with = "input")]
    write_default_config: Option<PathBuf>,
}

fn load_params(explicit: Option<&Path>, snapshot: &Path) -> Result<DetectorParams> {
    if let Some(path) = explicit {
        info!("Loading parameters from: {}", path.display());
        return DetectorParams::from_file(path)
            .with_context(|| format!("failed to load parameters from {}", path.display()));
    }
    if snapshot.exists() {
        info!("Loading parameters from: {}", snapshot.display());
        match DetectorParams::from_file(snapshot) {
            Ok(params) => return Ok(params),
            Err(e) => warn!("Ignoring {}: {}. Using defaults.", snapshot.display(), e),
        }
    }
    Ok(DetectorParams::default())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if let Some(path) = &args.write_default_config {
        DetectorParams::default().to_file(path)?;
        info!("Wrote default parameters to {}", path.display());
        return Ok(());
    }

    let input = args.input.context("no input movie given")?;
    let paths = OutputPaths::for_input(&input);
    let params = load_params(args.config.as_deref(), &paths.parameters)?;
    info!("Detector parameters:\n{params}");

    let mut source = VideoFileSource::open(&input)
        .with_context(|| format!("failed to open movie {}", input.display()))?;

    let options = TrackerOptions {
        overwrite: args.overwrite,
        continuity: args.continuity,
        ..TrackerOptions::default()
    };
    let mut tracker = Tracker::new(PupilLedDetector::new(params.clone())?, options);
    let mut results = YamlResultsFile::new(&paths.results);
    let mut video: Box<dyn FrameSink> = if args.no_video {
        Box::new(NullSink)
    } else {
        Box::new(VideoFileSink::new(&paths.video))
    };

    let summary = tracker.run(&mut source, video.as_mut(), &mut results)?;
    params.to_file(&paths.parameters)?;
    info!("Saved parameters to {}", paths.parameters.display());
    println!("{summary}");

    Ok(())
}
