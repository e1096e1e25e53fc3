pub mod backend;
pub mod config;
pub mod detection;
pub mod detector;
pub mod labels;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::{ExecutionProvider, InferenceConfig};
pub use detection::Detection;
pub use detector::Detector;
pub use labels::LabelMap;
