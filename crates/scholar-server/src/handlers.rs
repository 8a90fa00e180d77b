use crate::middleware::auth::AuthContext;
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde_json::json;
use std::sync::Arc;

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "service": "scholar-server" }))
}

/// Raw Ed25519 public key, for services that verify tokens offline.
pub async fn public_key(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        state.token_maker.public_key().to_vec(),
    )
}

pub async fn whoami(ctx: AuthContext) -> Json<serde_json::Value> {
    Json(json!({
        "user_id": ctx.user_id,
        "email": ctx.email,
        "roles": ctx.roles,
        "subject": ctx.subject,
        "expires_at": ctx.payload.expiration.to_rfc3339(),
    }))
}
