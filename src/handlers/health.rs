use axum::response::Json;
use serde_json::{json, Value};

/// GET /healthz - liveness probe
pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "OK"}))
}

/// GET /ready - readiness probe
pub async fn ready() -> Json<Value> {
    Json(json!({"status": "OK"}))
}
