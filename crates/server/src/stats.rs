use inference::Detection;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    /// LOW for 0-1 aircraft, MEDIUM for 2-4, HIGH from 5 up.
    pub fn from_count(count: usize) -> Self {
        match count {
            0..=1 => ThreatLevel::Low,
            2..=4 => ThreatLevel::Medium,
            _ => ThreatLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummary {
    pub detection_count: usize,
    pub mean_confidence: f32,
    pub inference_ms: f64,
    pub threat_level: ThreatLevel,
}

impl DetectionSummary {
    pub fn new(detections: &[Detection], inference_time: Duration) -> Self {
        Self {
            detection_count: detections.len(),
            mean_confidence: mean_confidence(detections),
            inference_ms: inference_time.as_secs_f64() * 1000.0,
            threat_level: ThreatLevel::from_count(detections.len()),
        }
    }
}

/// Arithmetic mean of the confidences, 0 when there are none.
pub fn mean_confidence(detections: &[Detection]) -> f32 {
    if detections.is_empty() {
        return 0.0;
    }
    let total: f32 = detections.iter().map(|d| d.confidence).sum();
    total / detections.len() as f32
}
