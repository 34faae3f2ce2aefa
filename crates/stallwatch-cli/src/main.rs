mod render;

use ab_glyph::FontVec;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::RgbImage;
use stallwatch_core::detection::{extract_vehicles, ExtractConfig};
use stallwatch_core::occupancy::{OccupancyClassifier, OccupancyConfig};
use stallwatch_core::report::RunSummary;
use stallwatch_core::stalls::load_stalls;
use stallwatch_import_detections::{import_detections, DetectorOptions};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stallwatch")]
#[command(about = "Parking stall occupancy from a single lot image.")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify every stall in the table as occupied or free.
    Classify {
        /// Lot image the detections and stall polygons refer to.
        #[arg(long)]
        image: PathBuf,
        /// CSV with `stall_id,polygon` rows.
        #[arg(long)]
        stalls: PathBuf,
        /// Detector output (JSON) for the image.
        #[arg(long)]
        detections: PathBuf,
        #[arg(long, default_value = "outputs")]
        outdir: PathBuf,
        /// Detector confidence threshold.
        #[arg(long, default_value_t = 0.25)]
        conf: f64,
        /// Detector NMS IoU threshold.
        #[arg(long, default_value_t = 0.5)]
        iou: f64,
        /// area(vehicle ∩ stall) / area(stall) needed to call a stall occupied.
        #[arg(long, default_value_t = 0.15)]
        overlap_thresh: f64,
        /// Ignore detections smaller than this (px^2).
        #[arg(long, default_value_t = 100.0)]
        min_car_area: f64,
        /// Shrink each stall by this many pixels before measuring overlap.
        #[arg(long, default_value_t = 0.0)]
        stall_inset: f64,
        /// TTF/OTF font for `id:O|F` stall labels; a dot marks each stall without one.
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

struct ClassifyArgs {
    image: PathBuf,
    stalls: PathBuf,
    detections: PathBuf,
    outdir: PathBuf,
    font: Option<PathBuf>,
    detector: DetectorOptions,
    extract: ExtractConfig,
    occupancy: OccupancyConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Classify {
            image,
            stalls,
            detections,
            outdir,
            conf,
            iou,
            overlap_thresh,
            min_car_area,
            stall_inset,
            font,
        } => classify(ClassifyArgs {
            image,
            stalls,
            detections,
            outdir,
            font,
            detector: DetectorOptions {
                confidence: conf,
                iou,
            },
            extract: ExtractConfig { min_car_area },
            occupancy: OccupancyConfig {
                overlap_thresh,
                stall_inset,
            },
        }),
    }
}

fn classify(args: ClassifyArgs) -> Result<()> {
    let classifier = OccupancyClassifier::new(args.occupancy).context("invalid configuration")?;

    let lot = load_lot_image(&args.image)?;
    let font = args.font.as_deref().map(load_font).transpose()?;

    let table = load_stalls(&args.stalls)
        .with_context(|| format!("load stalls: {:?}", args.stalls))?;
    info!(
        loaded = table.stalls.len(),
        skipped = table.skipped.len(),
        "loaded stall table"
    );

    let output = import_detections(&args.detections, &args.detector)?;
    let vehicles = extract_vehicles(&output, &args.extract);
    info!(
        detections = output.detections.len(),
        vehicles = vehicles.len(),
        "extracted vehicle geometry"
    );

    let occupancy = classifier.classify(&vehicles, &table.stalls);
    let summary = RunSummary::new(args.image.display().to_string(), &occupancy);
    let regions: Vec<_> = table
        .stalls
        .iter()
        .map(|s| classifier.measured_region(s))
        .collect();
    let annotated = render::annotate(&lot, &regions, &occupancy.results, font.as_ref());

    std::fs::create_dir_all(&args.outdir)
        .with_context(|| format!("create output dir: {:?}", args.outdir))?;
    let stem = image_stem(&args.image);
    let out_img = args.outdir.join(format!("{stem}_annotated.png"));
    let out_json = args.outdir.join(format!("{stem}_summary.json"));

    annotated
        .save(&out_img)
        .with_context(|| format!("write annotated image: {out_img:?}"))?;
    let json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    std::fs::write(&out_json, &json).with_context(|| format!("write summary: {out_json:?}"))?;

    println!("saved {}", out_img.display());
    println!("saved {}", out_json.display());
    Ok(())
}

fn load_lot_image(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).with_context(|| format!("read image: {path:?}"))?;
    Ok(img.to_rgb8())
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).with_context(|| format!("read font: {path:?}"))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parse font: {path:?}"))
}

fn image_stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
}
