pub mod link_metadata;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Liveness probe. The service has no backing store, so being able to answer
/// is the whole check.
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "link-resolver",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
