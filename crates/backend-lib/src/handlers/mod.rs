// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.

pub mod account;
pub mod catalog;

use axum::Json;
use toolroom_common::ApiMessage;

/// Liveness probe
pub async fn health() -> Json<ApiMessage> {
    Json(ApiMessage::new("ok"))
}
