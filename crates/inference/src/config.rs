use serde::Deserialize;

pub const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

/// Model settings. Defaults match an ultralytics YOLOv8 ONNX export.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub path: String,
    pub labels_path: Option<String>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub intra_threads: usize,
    pub provider: ExecutionProvider,
    pub input_name: String,
    pub output_name: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            path: "models/best.onnx".to_string(),
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            intra_threads: 4,
            provider: ExecutionProvider::Cpu,
            input_name: "images".to_string(),
            output_name: "output0".to_string(),
        }
    }
}

impl InferenceConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.input_size == 0 {
            anyhow::bail!("input_size must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!("iou_threshold must be within [0, 1], got {}", self.iou_threshold);
        }
        if self.max_detections == 0 {
            anyhow::bail!("max_detections must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InferenceConfig::default();
        assert_eq!(config.input_size, 640);
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.iou_threshold, 0.7);
        assert_eq!(config.provider, ExecutionProvider::Cpu);
        assert!(config.labels_path.is_none());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(InferenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let cases = [
            InferenceConfig { input_size: 0, ..Default::default() },
            InferenceConfig { confidence_threshold: 1.5, ..Default::default() },
            InferenceConfig { confidence_threshold: f32::NAN, ..Default::default() },
            InferenceConfig { iou_threshold: -0.1, ..Default::default() },
            InferenceConfig { max_detections: 0, ..Default::default() },
        ];

        for config in cases {
            assert!(config.validate().is_err(), "{:?} should be rejected", config);
        }
    }

    #[test]
    fn test_validate_accepts_threshold_bounds() {
        let config = InferenceConfig {
            confidence_threshold: 0.0,
            iou_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
