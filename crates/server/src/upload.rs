use crate::{
    error::AppError,
    render::encode_jpeg,
    state::AppState,
    stats::DetectionSummary,
    storage::{ALLOWED_EXTENSIONS, allowed_extension},
};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use inference::Detection;
use serde::Serialize;
use std::{sync::PoisonError, time::Instant};

const FILE_FIELD: &str = "file";

/// A validated upload that has not touched the filesystem yet.
#[derive(Debug)]
pub struct UploadForm {
    pub filename: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct DetectionView {
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
    pub bbox: [f32; 4],
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub original_image: String,
    pub result_image: String,
    pub detections: Vec<DetectionView>,
    #[serde(flatten)]
    pub summary: DetectionSummary,
    pub filename: String,
    pub result_filename: String,
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let started = Instant::now();

    let result = handle_upload(state.clone(), multipart).await;

    match &result {
        Ok(response) => {
            state
                .metrics
                .record("success", started.elapsed(), response.summary.detection_count);
            tracing::info!(
                filename = %response.filename,
                detections = response.summary.detection_count,
                threat_level = response.summary.threat_level.as_str(),
                inference_ms = response.summary.inference_ms,
                "Upload processed"
            );
        }
        Err(e) => state.metrics.record(e.outcome(), started.elapsed(), 0),
    }

    result.map(Json)
}

async fn handle_upload(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadResponse, AppError> {
    let multipart =
        multipart.map_err(|e| AppError::validation(format!("Invalid upload request: {}", e)))?;
    let form = read_upload(multipart).await?;

    tokio::task::spawn_blocking(move || process_upload(&state, form))
        .await
        .map_err(|e| AppError::Internal(format!("upload task failed: {}", e)))?
}

/// Pull the `file` field out of the form and validate it.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            file = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) = file.ok_or_else(|| AppError::validation("No file part in the request."))?;
    validate_upload(filename, bytes.to_vec())
}

pub fn validate_upload(filename: String, bytes: Vec<u8>) -> Result<UploadForm, AppError> {
    if filename.trim().is_empty() {
        return Err(AppError::validation("No file selected."));
    }

    let extension = allowed_extension(&filename).ok_or_else(|| {
        AppError::validation(format!(
            "Invalid file type. Allowed types: {}.",
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })?;

    if bytes.is_empty() {
        return Err(AppError::validation("Uploaded file is empty."));
    }

    Ok(UploadForm {
        filename,
        extension,
        bytes,
    })
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::validation(format!("Malformed upload: {}", e.body_text()))
    }
}

/// Persist, decode, detect, render and summarise one upload. Blocking.
#[tracing::instrument(skip_all, fields(original = %form.filename))]
pub fn process_upload(state: &AppState, form: UploadForm) -> Result<UploadResponse, AppError> {
    let stored = state
        .store
        .save_upload(&form.filename, &form.extension, form.bytes)?;

    let image = image::load_from_memory(&stored.bytes)
        .map_err(|e| {
            tracing::warn!(file = %stored.filename, error = %e, "Stored upload could not be decoded");
            AppError::validation("Uploaded file is not a readable image.")
        })?
        .to_rgb8();

    let (detections, elapsed) = {
        // Detector keeps no state a panicking call could leave half-written
        let mut detector = state.detector.lock().unwrap_or_else(PoisonError::into_inner);

        let started = Instant::now();
        let detections = detector.detect(&image).map_err(AppError::Inference)?;
        (detections, started.elapsed())
    };

    let annotated = state.renderer.render(&image, &detections, &state.labels);
    let jpeg = encode_jpeg(&annotated)
        .map_err(|e| AppError::Internal(format!("result encoding failed: {:#}", e)))?;
    let result_filename = state.store.save_result(&stored.filename, &jpeg)?;
    tracing::debug!(
        original = %stored.original_name,
        stored = %stored.filename,
        result = %result_filename,
        "Result saved"
    );

    let summary = DetectionSummary::new(&detections, elapsed);

    Ok(UploadResponse {
        success: true,
        original_image: STANDARD.encode(&stored.bytes),
        result_image: STANDARD.encode(&jpeg),
        detections: detections.iter().map(|d| view(d, state)).collect(),
        summary,
        filename: stored.filename,
        result_filename,
    })
}

fn view(detection: &Detection, state: &AppState) -> DetectionView {
    DetectionView {
        confidence: detection.confidence,
        class_id: detection.class_id,
        class_name: state.labels.name(detection.class_id).into_owned(),
        bbox: detection.bbox,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_supported_types() {
        for name in ["a.jpg", "B.JPEG", "c.png", "d.BMP", "e.tif", "f.TiFf"] {
            let form = validate_upload(name.to_string(), vec![1]).unwrap();
            assert_eq!(form.extension, form.extension.to_lowercase());
        }
    }

    #[test]
    fn test_validate_rejects_empty_filename() {
        let err = validate_upload(String::new(), vec![1]).unwrap_err();
        assert_eq!(err.client_message(), "No file selected.");
    }

    #[test]
    fn test_validate_rejects_unknown_extension() {
        let err = validate_upload("notes.txt".to_string(), vec![1]).unwrap_err();
        assert!(err.client_message().starts_with("Invalid file type."));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validate_rejects_empty_body() {
        let err = validate_upload("plane.png".to_string(), Vec::new()).unwrap_err();
        assert_eq!(err.client_message(), "Uploaded file is empty.");
    }
}
