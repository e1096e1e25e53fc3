//! Batch annotation of image files on disk, outside the web server.

use crate::{
    render::{Renderer, encode_jpeg},
    storage::{allowed_extension, result_filename},
};
use anyhow::Context;
use inference::Detector;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug)]
pub struct Prediction {
    pub output: PathBuf,
    pub detections: usize,
}

/// Expand `inputs` into a sorted list of supported image files.
///
/// Directories contribute their direct children only. Explicit files with an
/// unsupported extension are skipped with a warning.
pub fn collect_images(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input)
                .with_context(|| format!("Failed to read directory {}", input.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_file() && is_supported(&path) {
                    images.push(path);
                }
            }
        } else if !input.exists() {
            anyhow::bail!("Input not found: {}", input.display());
        } else if is_supported(input) {
            images.push(input.clone());
        } else {
            tracing::warn!(path = %input.display(), "Skipping unsupported file");
        }
    }

    images.sort();
    images.dedup();
    Ok(images)
}

fn is_supported(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(allowed_extension)
        .is_some()
}

/// `<out_dir>/detected_<stem>.jpg`, the same naming the server uses for results.
pub fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    out_dir.join(result_filename(&name))
}

/// Detect, draw and write one annotated JPEG into `out_dir`.
pub fn predict_file(
    detector: &mut Detector,
    renderer: &Renderer,
    input: &Path,
    out_dir: &Path,
) -> anyhow::Result<Prediction> {
    let image = image::open(input)
        .with_context(|| format!("Failed to decode {}", input.display()))?
        .to_rgb8();

    let detections = detector.detect(&image)?;
    let annotated = renderer.render(&image, &detections, detector.labels());
    let jpeg = encode_jpeg(&annotated)?;

    let output = output_path(out_dir, input);
    fs::write(&output, jpeg).with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        detections = detections.len(),
        "Prediction written"
    );

    Ok(Prediction {
        output,
        detections: detections.len(),
    })
}
