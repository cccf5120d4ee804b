//! API route handlers.

pub mod auth;

use crate::auth::session::AuthSession;
use axum::{routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthSession>,
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/nonce", post(auth::request_nonce))
        .route("/api/v1/auth/verify", post(auth::verify_sign_in))
        .route("/api/v1/health", get(health))
}

/// GET /api/v1/health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
