use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::capability::Capability;
use crate::domain::status::{TransactionKind, TransactionStatus};
use crate::error::LedgerError;
use crate::handlers::actor_from_headers;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub amount_units: i64,
    pub amount_fiat: Option<BigDecimal>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: TransactionStatus,
    pub note: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let created = state
        .ledger
        .create(req.owner_id, req.kind, req.amount_units, req.amount_fiat)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::Access).await?;

    let tx = queries::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
    Ok(Json(tx))
}

pub async fn transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<TransitionRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    let updated = state
        .ledger
        .transition(id, req.status, &actor, req.note.as_deref())
        .await?;
    Ok(Json(updated))
}
