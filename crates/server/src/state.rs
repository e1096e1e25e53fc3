use crate::{metrics::UploadMetrics, render::Renderer, storage::UploadStore};
use inference::{Detector, LabelMap};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct AppState {
    /// `ort` sessions need `&mut self` to run, so requests take turns.
    pub detector: Arc<Mutex<Detector>>,
    pub labels: Arc<LabelMap>,
    pub renderer: Arc<Renderer>,
    pub store: Arc<UploadStore>,
    pub metrics: Arc<UploadMetrics>,
    pub model_path: Arc<str>,
}

impl AppState {
    pub fn new(
        detector: Detector,
        renderer: Renderer,
        store: UploadStore,
        model_path: &str,
    ) -> Self {
        let labels = Arc::new(detector.labels().clone());

        Self {
            detector: Arc::new(Mutex::new(detector)),
            labels,
            renderer: Arc::new(renderer),
            store: Arc::new(store),
            metrics: Arc::new(UploadMetrics::new()),
            model_path: Arc::from(model_path),
        }
    }
}
