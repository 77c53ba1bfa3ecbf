use axum::{response::IntoResponse, Json};
use serde_json::json;

// axum handler for root
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": format!("Hello from {}!", env!("CARGO_PKG_NAME")) }))
}
