use anyhow::Context;
use clap::Parser;
use common::{Environment, LogLevel};
use indicatif::{ProgressBar, ProgressStyle};
use inference::{Detector, InferenceConfig};
use server::{
    predict::{collect_images, predict_file},
    render::Renderer,
};
use std::{fs, path::PathBuf};

/// Annotate SAR images with detected aircraft and write them as JPEGs.
#[derive(Parser)]
#[command(name = "predict", version, long_about = None)]
struct Args {
    /// Image files or directories of images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for annotated images
    #[arg(short, long, default_value = "predictions")]
    output: PathBuf,

    /// YOLOv8 ONNX model path
    #[arg(long, default_value = "models/best.onnx")]
    model: String,

    /// Class names file, one per line
    #[arg(long)]
    labels: Option<String>,

    /// Minimum detection confidence (0-1)
    #[arg(long, default_value_t = 0.1)]
    conf: f32,

    /// NMS IoU threshold (0-1)
    #[arg(long, default_value_t = 0.7)]
    iou: f32,
}

fn main() -> anyhow::Result<()> {
    common::setup_logging(LogLevel::Warn, Environment::Development);

    let args = Args::parse();

    let images = collect_images(&args.inputs)?;
    if images.is_empty() {
        anyhow::bail!("No supported images found in the given inputs");
    }

    let config = InferenceConfig {
        path: args.model,
        labels_path: args.labels,
        confidence_threshold: args.conf,
        iou_threshold: args.iou,
        ..Default::default()
    };
    let mut detector = Detector::load(&config)
        .with_context(|| format!("Failed to load model {}", config.path))?;
    let renderer = Renderer::new()?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let progress = ProgressBar::new(images.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {wide_msg}",
    )?);

    let mut written = 0;
    let mut detections = 0;
    for image in &images {
        progress.set_message(image.display().to_string());
        match predict_file(&mut detector, &renderer, image, &args.output) {
            Ok(prediction) => {
                written += 1;
                detections += prediction.detections;
            }
            Err(e) => progress.suspend(|| {
                tracing::warn!(path = %image.display(), error = %format!("{:#}", e), "Prediction failed");
            }),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!(
        "Annotated {written}/{} images ({detections} detections), saved to {}",
        images.len(),
        args.output.display()
    );

    Ok(())
}
