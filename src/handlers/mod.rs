pub mod fees;
pub mod transactions;
pub mod users;
pub mod webhooks;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;

use crate::error::LedgerError;
use crate::services::gate::Actor;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": if database == "connected" { "ok" } else { "degraded" },
        "database": database,
    }))
}

/// Moderator identity travels in the X-Actor header; the capability gate
/// decides what the resolved admin may do.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, LedgerError> {
    headers
        .get("x-actor")
        .and_then(|value| value.to_str().ok())
        .map(|handle| Actor::Handle(handle.to_string()))
        .ok_or(LedgerError::Denied)
}
