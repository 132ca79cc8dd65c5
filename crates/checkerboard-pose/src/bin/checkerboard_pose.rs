//! checkerboard-pose CLI: estimate board poses in image files, or render a
//! synthetic board for smoke tests.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use checkerboard_pose::core::synthetic::SyntheticScene;
use checkerboard_pose::{
    CameraInfo, CameraParams, Frame, JsonLinesSink, PipelineConfig, PngOverlayWriter,
    PosePipeline, Stamp,
};
use clap::{Args, Parser, Subcommand};
use image::ImageReader;
use log::{info, warn, LevelFilter};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const DEFAULT_OVERLAY_DIR: &str = "overlay";

#[derive(Parser)]
#[command(name = "checkerboard-pose")]
#[command(about = "Estimate the pose of a planar checkerboard relative to a calibrated camera")]
#[command(version)]
struct Cli {
    /// Log level: error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pose pipeline on image files and print JSON lines.
    Detect(DetectArgs),

    /// Render a synthetic board image and its calibration record.
    Render(RenderArgs),
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Calibration record (JSON with k, d, p).
    #[arg(long)]
    camera_info: PathBuf,

    /// Pipeline configuration (JSON); defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera frame id placed in the message headers.
    #[arg(long, default_value = "camera")]
    frame_id: String,

    /// Stamp for every frame in seconds; the wall clock is used when omitted.
    #[arg(long)]
    stamp: Option<f64>,

    /// Output file for the JSON lines; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Images processed in argument order.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct RenderArgs {
    /// Output PNG.
    #[arg(long)]
    output: PathBuf,

    /// Where to write the matching calibration record.
    #[arg(long)]
    camera_info_out: PathBuf,

    /// Board configuration (JSON); only the board fields are used.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "640")]
    width: u32,

    #[arg(long, default_value = "480")]
    height: u32,

    /// Focal length in pixels.
    #[arg(long, default_value = "600.0")]
    focal: f64,

    /// First radial distortion coefficient.
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    k1: f64,

    /// Board distance along the optical axis, in board units.
    #[arg(long, default_value = "0.8")]
    distance: f64,

    /// Tilt about the board x axis, radians.
    #[arg(long, default_value = "0.2", allow_hyphen_values = true)]
    tilt_x: f64,

    /// Tilt about the board y axis, radians.
    #[arg(long, default_value = "-0.1", allow_hyphen_values = true)]
    tilt_y: f64,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Detect(args) => run_detect(args),
        Commands::Render(args) => run_render(args),
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: &str) -> CliResult<()> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    checkerboard_pose::core::init_with_level(level)?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(level: &str) -> CliResult<()> {
    // RUST_LOG takes precedence; the flag only matters for the log facade.
    log::set_max_level(LevelFilter::from_str(level).unwrap_or(LevelFilter::Info));
    checkerboard_pose::core::init_tracing(false);
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    })
}

fn load_camera_info(path: &Path) -> CliResult<CameraInfo> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(args)))]
fn run_detect(args: DetectArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let camera_info = load_camera_info(&args.camera_info)?;
    let stamp = args.stamp.map(Stamp::from_secs_f64).unwrap_or_default();

    let mut overlay = config.show_detection.then(|| {
        PngOverlayWriter::new(
            config
                .overlay_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OVERLAY_DIR)),
        )
    });
    let pipeline = PosePipeline::new(config)?;

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Box::new(BufWriter::new(fs::File::create(path)?))
        }
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = JsonLinesSink::new(writer);

    let mut found = 0usize;
    for path in &args.images {
        let image = match ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
            Ok(reader) => match reader.decode() {
                Ok(img) => img.to_luma8(),
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    continue;
                }
            },
            Err(err) => {
                warn!("skipping {}: {err}", path.display());
                continue;
            }
        };
        let frame = Frame::new(image, stamp, args.frame_id.clone());
        let view = overlay
            .as_mut()
            .map(|w| w as &mut dyn checkerboard_pose::DetectionView);
        if pipeline
            .run_frame(&frame, &camera_info, &mut sink, view)?
            .is_some()
        {
            found += 1;
        }
    }

    info!("pose found in {found} of {} images", args.images.len());
    Ok(())
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(args)))]
fn run_render(args: RenderArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let model = config.pattern_model()?;

    let (w, h) = (args.width, args.height);
    let mut camera_info = CameraInfo::pinhole(
        w,
        h,
        args.focal,
        args.focal,
        w as f64 / 2.0,
        h as f64 / 2.0,
    );
    if args.k1 != 0.0 {
        camera_info.d = vec![args.k1, 0.0, 0.0, 0.0, 0.0];
    }
    let camera = CameraParams::from_camera_info(&camera_info, false);
    let pose = SyntheticScene::facing_pose(args.distance, args.tilt_x, args.tilt_y);
    let scene = SyntheticScene::new(w as usize, h as usize, camera, pose);

    let rendered = scene.render(&model);
    let img = image::GrayImage::from_raw(w, h, rendered.data)
        .ok_or("rendered buffer does not match the image size")?;
    if let Some(parent) = args.output.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save(&args.output)?;
    fs::write(
        &args.camera_info_out,
        serde_json::to_string_pretty(&camera_info)?,
    )?;

    let t = pose.translation.vector;
    let r = pose.rotation.scaled_axis();
    info!(
        "rendered {}x{} board to {}: t = [{:.4}, {:.4}, {:.4}], r = [{:.4}, {:.4}, {:.4}]",
        model.spec().rows(),
        model.spec().cols(),
        args.output.display(),
        t.x,
        t.y,
        t.z,
        r.x,
        r.y,
        r.z
    );
    Ok(())
}
