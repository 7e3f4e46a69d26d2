pub mod request_id;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};

use crate::controllers::{health, jobs::JobController, keys::KeyController};
use crate::domain::keys::KeyPool;
use crate::infrastructure::config::Config;

/// Build the application router with every route and layer attached
pub fn build_router(
    pool: Arc<KeyPool>,
    job_controller: Arc<JobController>,
    key_controller: Arc<KeyController>,
) -> Router {
    // Narration jobs
    let job_routes = Router::new()
        .route(
            "/api/jobs",
            post(JobController::submit)
                .get(JobController::list)
                .delete(JobController::clear_finished),
        )
        .route("/api/jobs/events", get(JobController::events))
        .route(
            "/api/jobs/:id",
            get(JobController::get).delete(JobController::remove),
        )
        .route("/api/jobs/:id/cancel", post(JobController::cancel))
        .route("/api/jobs/:id/resume", post(JobController::resume))
        .route("/api/jobs/:id/audio", get(JobController::audio))
        .route(
            "/api/jobs/:id/chunks/:index/audio",
            get(JobController::chunk_audio),
        )
        .with_state(job_controller);

    // Key administration
    let key_routes = Router::new()
        .route("/api/keys", get(KeyController::list).post(KeyController::add))
        .route("/api/keys/reset", post(KeyController::reset_all))
        .route(
            "/api/keys/:id",
            axum::routing::delete(KeyController::remove).patch(KeyController::update),
        )
        .route("/api/keys/:id/validate", post(KeyController::validate))
        .route("/api/keys/:id/reset", post(KeyController::reset))
        .with_state(key_controller);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(pool)
        .merge(job_routes)
        .merge(key_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(CorsLayer::permissive()),
        )
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    pool: Arc<KeyPool>,
    job_controller: Arc<JobController>,
    key_controller: Arc<KeyController>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(pool, job_controller, key_controller);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
