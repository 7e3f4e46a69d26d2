use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::keys::KeyPool;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(pool): State<Arc<KeyPool>>) -> impl IntoResponse {
    let available = pool.available_count();
    let total = pool.len();

    if available > 0 {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "keys_available": available,
                "keys_total": total
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "keys_available": 0,
                "keys_total": total
            })),
        )
    }
}
