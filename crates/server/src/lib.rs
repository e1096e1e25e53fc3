pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod predict;
pub mod render;
pub mod routes;
pub mod state;
pub mod stats;
pub mod storage;
pub mod upload;
