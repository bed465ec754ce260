//! Scrape surface: `/metrics` plus a plain 404 for everything else.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::error;

use metrics_render::{MeterMetrics, RenderCache, EXPOSITION_CONTENT_TYPE};
use reading_store::ReadingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReadingStore>,
    pub metrics: Arc<MeterMetrics>,
    pub cache: Arc<RenderCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.cache.payload(&state.metrics, &state.store).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            bytes,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "metrics render failed");
            match state.cache.stale().await {
                Some(bytes) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
                    bytes,
                )
                    .into_response(),
                None => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "metrics rendering failed\n")
                        .into_response()
                }
            }
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found\n")
}
