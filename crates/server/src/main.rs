use inference::Detector;
use server::{
    config::get_configuration, logging::setup_logging, render::Renderer, routes::router,
    state::AppState, storage::UploadStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;
    // Exporters need the runtime, so telemetry starts inside it.
    let _telemetry = setup_logging(&config)?;

    tracing::info!(?config, "Server starting");

    let store = UploadStore::new(&config.upload_dir, &config.results_dir);
    store.ensure_dirs()?;

    let detector = Detector::load(&config.model).inspect_err(|e| {
        tracing::error!(path = %config.model.path, error = %e, "Failed to load detection model");
    })?;

    let state = AppState::new(detector, Renderer::new()?, store, &config.model.path);
    let app = router(state, config.max_upload_bytes);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
