use crate::config::ServerConfig;
use common::TelemetryGuard;

const SERVICE_NAME: &str = "server";

/// OTLP export when an endpoint is configured, plain log output otherwise.
pub fn setup_logging(config: &ServerConfig) -> anyhow::Result<Option<TelemetryGuard>> {
    match &config.otel_endpoint {
        Some(endpoint) => {
            let guard =
                TelemetryGuard::init(SERVICE_NAME, endpoint, config.log_level, config.environment)?;
            tracing::info!(%endpoint, "OpenTelemetry export enabled");
            Ok(Some(guard))
        }
        None => {
            common::setup_logging(config.log_level, config.environment);
            Ok(None)
        }
    }
}
