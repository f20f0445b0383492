use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::queries;
use crate::domain::capability::Capability;
use crate::error::LedgerError;
use crate::handlers::actor_from_headers;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta_units: i64,
    pub note: String,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::ManageUsers).await?;

    let handle = req.handle.trim();
    if handle.is_empty() {
        return Err(LedgerError::Validation("handle must not be empty".into()));
    }

    let created = queries::insert_user(&state.db, &User::new(handle.to_string())).await?;
    tracing::info!(user = %created.id, handle = %created.handle, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::Access).await?;

    let user = queries::get_user(&state.db, id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("user {id}")))?;
    Ok(Json(user))
}

/// Direct balance correction. Capability enforcement and the zero clamp
/// both live in the ledger service.
pub async fn adjust(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<AdjustRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    let record = state
        .ledger
        .force_adjust(id, req.delta_units, &req.note, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
