use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

const METER_NAME: &str = "server";

/// Upload pipeline instruments on the global meter. No-ops until a meter
/// provider is installed.
pub struct UploadMetrics {
    duration: Histogram<f64>,
    uploads: Counter<u64>,
    detections: Counter<u64>,
}

impl UploadMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            duration: meter
                .f64_histogram("upload_duration_seconds")
                .with_description("Time to handle one upload (store + infer + render + encode)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            uploads: meter
                .u64_counter("uploads_total")
                .with_description("Total uploads handled, by outcome")
                .build(),
            detections: meter
                .u64_counter("upload_detections_total")
                .with_description("Total detections returned")
                .build(),
        }
    }

    pub fn record(&self, outcome: &'static str, elapsed: Duration, detections: usize) {
        let attrs = [KeyValue::new("outcome", outcome)];
        self.duration.record(elapsed.as_secs_f64(), &attrs);
        self.uploads.add(1, &attrs);
        if detections > 0 {
            self.detections.add(detections as u64, &[]);
        }
    }
}

impl Default for UploadMetrics {
    fn default() -> Self {
        Self::new()
    }
}
