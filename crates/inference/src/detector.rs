use crate::{
    backend::{InferenceBackend, InferenceOutput},
    config::InferenceConfig,
    detection::Detection,
    labels::LabelMap,
    processing::{post::PostProcessor, pre::PreProcessor},
};
use image::RgbImage;

/// Pre-processing, model call and post-processing for a single image.
pub struct Detector {
    backend: Box<dyn InferenceBackend>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    labels: LabelMap,
}

impl Detector {
    pub fn new(backend: Box<dyn InferenceBackend>, config: &InferenceConfig, labels: LabelMap) -> Self {
        Self {
            backend,
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(
                config.confidence_threshold,
                config.iou_threshold,
                config.max_detections,
            ),
            labels,
        }
    }

    /// Load the ONNX model and the label map described by `config`.
    #[cfg(feature = "ort-backend")]
    pub fn load(config: &InferenceConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let labels = match &config.labels_path {
            Some(path) => LabelMap::from_file(path)?,
            None => LabelMap::default(),
        };

        let backend = crate::backend::ort::OrtBackend::load_model(config)?;
        tracing::info!(classes = labels.len(), "Detector ready");

        Ok(Self::new(Box::new(backend), config, labels))
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let (input, transform) = self.preprocessor.preprocess(image)?;

        let InferenceOutput { predictions } = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            self.backend.infer(&input)?
        };

        let detections = self
            .postprocessor
            .parse_detections(&predictions.view(), &transform)?;

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            detections = detections.len(),
            "Image processed"
        );

        Ok(detections)
    }
}
