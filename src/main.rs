//! Scroll Stitch CLI
//!
//! Stitches captured viewport images into one tall image, or runs a
//! demonstration over a synthetic scrolling page.

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::RgbImage;
use scroll_stitch::{
    capture::{DirectorySource, FrameSource, MockScrollSource, ScrollConfig},
    metrics::MetricsRegistry,
    EstimatorConfig, FileConfig, Frame, StitchReport, Stitcher,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "scroll-stitch")]
#[command(about = "Stitch overlapping scrolling-screenshot frames into one image")]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    stitch: StitchArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch frames cut from a synthetic scrolling page.
    Demo(DemoArgs),
}

#[derive(Debug, Args)]
struct StitchArgs {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Estimator preset, used when no config file is given.
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Output image (default: timestamped PNG in the working directory).
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Stack frames without overlap detection.
    #[arg(long)]
    concat: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    metrics: bool,

    /// Frame images in capture order, or a single directory.
    frames: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct DemoArgs {
    /// Number of captures.
    #[arg(long, default_value = "5")]
    frames: u32,

    /// Rows scrolled between captures.
    #[arg(long, default_value = "180")]
    step: u32,

    /// Output image (default: timestamped PNG in the working directory).
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Strict,
    Permissive,
}

impl Preset {
    fn estimator(self) -> EstimatorConfig {
        match self {
            Preset::Default => EstimatorConfig::default(),
            Preset::Strict => EstimatorConfig::strict(),
            Preset::Permissive => EstimatorConfig::permissive(),
        }
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Scroll Stitch v{}", scroll_stitch::VERSION);

    let result = match cli.command {
        Some(Commands::Demo(args)) => run_demo(&args),
        None => run_stitch(&cli.stitch),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run_stitch(args: &StitchArgs) -> CliResult<()> {
    let config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig {
            estimator: args.preset.estimator(),
            ..Default::default()
        },
    };

    let frames = load_frames(&args.frames)?;
    info!(frames = frames.len(), "Loaded frames");

    let stitcher = Stitcher::from_config(&config);
    let canvas = if args.concat {
        stitcher.concatenate(&frames)?
    } else {
        let (canvas, report) = stitcher.stitch_with_report(&frames)?;
        log_report(&report);
        if args.metrics {
            let registry = MetricsRegistry::new()?;
            registry.update(&report);
            print!("{}", registry.encode()?);
        }
        canvas
    };

    save(&canvas, args.output.as_deref())
}

fn run_demo(args: &DemoArgs) -> CliResult<()> {
    let viewport = ScrollConfig::default();
    let frames = args.frames.max(1);
    let config = ScrollConfig {
        page_height: viewport.viewport_height + args.step * (frames - 1),
        scroll_step: args.step,
        ..viewport
    };

    let mut source = MockScrollSource::new(config)?;
    let captured = source.collect_frames();
    let page = Frame::new(source.page().clone(), 0).to_rgb();

    let (canvas, report) = Stitcher::default().stitch_with_report(&captured)?;
    log_report(&report);

    if canvas == page {
        info!("Output matches the synthetic page exactly");
    } else {
        warn!(
            expected_height = page.height(),
            actual_height = canvas.height(),
            "Output differs from the synthetic page"
        );
    }

    save(&canvas, args.output.as_deref())
}

fn load_frames(inputs: &[PathBuf]) -> CliResult<Vec<Frame>> {
    let mut source = match inputs {
        [] => return Err("no input frames given".into()),
        [dir] if dir.is_dir() => DirectorySource::from_dir(dir)?,
        paths => DirectorySource::from_paths(paths.iter().cloned()),
    };
    Ok(source.collect_frames())
}

fn log_report(report: &StitchReport) {
    for seam in &report.seams {
        info!(
            seam = seam.index,
            frame = seam.sequence,
            rows = seam.estimate.rows,
            confident = seam.estimate.confident,
            technique = %seam.estimate.technique,
            "Seam"
        );
    }
    if report.concatenated {
        warn!("Frames were concatenated without overlap detection");
    }
}

fn save(canvas: &RgbImage, output: Option<&Path>) -> CliResult<()> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(format!(
            "scroll-stitch-{}.png",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        )),
    };
    canvas.save(&path)?;
    info!(
        path = %path.display(),
        width = canvas.width(),
        height = canvas.height(),
        "Saved output"
    );
    Ok(())
}
