use common::{Environment, LogLevel};
use inference::InferenceConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub upload_dir: String,
    pub results_dir: String,
    pub otel_endpoint: Option<String>,
    #[serde(default)]
    pub model: InferenceConfig,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn get_configuration() -> Result<ServerConfig, config::ConfigError> {
    load_configuration(None)
}

/// Build the configuration from defaults and `DETECT_*` variables.
///
/// `overrides` replaces the process environment as the variable source.
pub fn load_configuration(
    overrides: Option<config::Map<String, String>>,
) -> Result<ServerConfig, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 5000)?
        .set_default("max_upload_bytes", 16 * 1024 * 1024)?
        .set_default("upload_dir", "uploads")?
        .set_default("results_dir", "results")?
        .add_source(
            config::Environment::with_prefix("DETECT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(overrides),
        )
        .build()?;

    let settings = config.try_deserialize::<ServerConfig>()?;
    settings
        .model
        .validate()
        .map_err(|e| config::ConfigError::Message(format!("model: {e}")))?;
    Ok(settings)
}
