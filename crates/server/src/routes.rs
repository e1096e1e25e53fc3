use crate::{state::AppState, upload::upload};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    response::Html,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

const INDEX_HTML: &str = include_str!("../assets/index.html");

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.store.upload_dir());
    let results = ServeDir::new(state.store.results_dir());

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/health", get(health))
        .nest_service("/uploads", uploads)
        .nest_service("/results", results)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": &*state.model_path,
    }))
}
