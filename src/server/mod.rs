mod handlers;
mod state;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/resolve", post(handlers::resolve))
        .route("/api/normalize", get(handlers::normalize_name))
        .route("/api/aliases", get(handlers::aliases))
        .route("/api/cache", get(handlers::cache_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, state: AppState) -> std::io::Result<()> {
    let app = build_router(Arc::new(state));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("geoplace server listening on http://{}", addr);
    axum::serve(listener, app).await
}
