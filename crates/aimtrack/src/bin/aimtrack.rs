//! aimtrack CLI: inspect the default configuration, run detection on image
//! files, or replay a directory of frames through the threaded pipeline.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use aimtrack::core::{Clock, Frame, MonotonicClock, SharedAngle};
use aimtrack::detect::{default_detector, load_rgb, ImageReport, TrackError};
use aimtrack::pipeline::{
    CameraCapture, FanoutSink, FrameSlot, JsonLinesSink, ResultsStore, TargetProcessor,
    TargetingLoop, TrackerConfig,
};
use aimtrack::replay::{list_images, ImageSequenceDevice};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "aimtrack")]
#[command(about = "Detect the goal target in camera frames and compute aiming solutions")]
#[command(version)]
struct Cli {
    /// Log level for stderr output (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default configuration as JSON.
    DefaultConfig {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run detection on image files and print a JSON report.
    Detect(DetectArgs),

    /// Replay a directory of frames through the capture and targeting threads.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct DetectArgs {
    /// Configuration file (JSON); defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mechanism angle in radians.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    arm_angle: f64,

    /// Images to process.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Configuration file (JSON); defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of frames, played in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Start over at the end of the directory.
    #[arg(long = "loop")]
    looping: bool,

    /// Minimum time between frames, milliseconds.
    #[arg(long, default_value_t = 33)]
    interval_ms: u64,

    /// Only print updates that carry a target.
    #[arg(long)]
    targets_only: bool,

    /// Mechanism angle in radians.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    arm_angle: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match cli.command {
        Commands::DefaultConfig { out } => run_default_config(out),
        Commands::Detect(args) => run_detect(args),
        Commands::Run(args) => run_pipeline(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter) {
    aimtrack::core::init_tracing_with_level(false, level);
    // Fails harmlessly when the subscriber already bridged `log` records.
    let _ = tracing_log::LogTracer::init();
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) {
    if let Err(e) = aimtrack::core::init_with_level(level) {
        eprintln!("failed to install logger: {e}");
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<TrackerConfig, TrackError> {
    match path {
        Some(path) => {
            log::info!("loading config from {}", path.display());
            Ok(TrackerConfig::load_json(path)?)
        }
        None => Ok(TrackerConfig::default()),
    }
}

fn run_default_config(out: Option<PathBuf>) -> Result<(), TrackError> {
    let config = TrackerConfig::default();
    match out {
        Some(path) => config.write_json(&path)?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", config.to_json_string()?)?;
        }
    }
    Ok(())
}

fn run_detect(args: DetectArgs) -> Result<(), TrackError> {
    let config = load_config(args.config.as_ref())?;
    let clock = Arc::new(MonotonicClock::new());
    let mut processor = TargetProcessor::new(
        default_detector(&config),
        config.heading_buffer(),
        SharedAngle::new(args.arm_angle),
        Vec::new(),
        clock.clone(),
    )
    .with_latency(config.camera_latency());

    let mut reports = Vec::with_capacity(args.images.len());
    for (sequence, path) in args.images.iter().enumerate() {
        let image = load_rgb(path)?;
        let (width, height) = (image.width, image.height);
        let frame = Frame::new(image, clock.now(), sequence as u64);
        let report = processor.process(&frame);
        log::info!(
            "{}: {} candidates, {} valid",
            path.display(),
            report.detection.targets.len(),
            report.detection.valid_count()
        );
        reports.push(ImageReport {
            image: path.display().to_string(),
            width,
            height,
            report,
        });
    }

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &reports)?;
    writeln!(stdout)?;
    Ok(())
}

fn run_pipeline(args: RunArgs) -> Result<(), TrackError> {
    let config = load_config(args.config.as_ref())?;
    let deadline = args
        .duration
        .map(|s| {
            Duration::try_from_secs_f64(s)
                .map_err(|_| TrackError::InvalidArgument(format!("duration {s}")))
        })
        .transpose()?
        .map(|d| Instant::now() + d);

    if list_images(&args.frames)?.is_empty() {
        return Err(TrackError::InvalidArgument(format!(
            "no images in {}",
            args.frames.display()
        )));
    }

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let slot = Arc::new(FrameSlot::new());
    let store = ResultsStore::with_timeout(clock.clone(), config.staleness_timeout());
    let sink = FanoutSink::new()
        .with(JsonLinesSink::new(io::stdout()).targets_only(args.targets_only))
        .with(store.clone());

    let processor = TargetProcessor::new(
        default_detector(&config),
        config.heading_buffer(),
        SharedAngle::new(args.arm_angle),
        sink,
        clock.clone(),
    )
    .with_latency(config.camera_latency());
    let mut targeting = TargetingLoop::new(processor, Arc::clone(&slot));

    let device = ImageSequenceDevice::new(&args.frames)
        .with_loop(args.looping)
        .with_interval(Duration::from_millis(args.interval_ms));
    let mut capture = CameraCapture::new(device, Arc::clone(&slot), clock)
        .with_settings(config.capture_settings())
        .with_reconnect_interval(config.reconnect_interval());

    targeting.start()?;
    capture.start()?;
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if capture.is_finished() && !slot.has_pending() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    capture.stop()?;
    targeting.stop()?;

    let stats = slot.stats();
    let snapshot = store.snapshot();
    log::info!(
        "captured {} frames, processed {}, dropped {}; last result {}",
        capture.frames_captured(),
        stats.taken,
        stats.dropped,
        if snapshot.stale { "stale" } else { "fresh" }
    );
    Ok(())
}
