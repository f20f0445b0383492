use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::queries;
use crate::error::LedgerError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub owner_id: Uuid,
    pub fiat_amount: f64,
}

/// Dry-run fee calculation against the owner's configured percent and
/// threshold, at the rate the oracle reports right now.
pub async fn quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<impl IntoResponse, LedgerError> {
    let owner = queries::get_user(&state.db, params.owner_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("user {}", params.owner_id)))?;

    let fiat_amount = BigDecimal::try_from(params.fiat_amount)
        .map_err(|_| LedgerError::Validation("fiat_amount is not a number".into()))?;

    let rate = state.oracle.conversion_rate().await;
    let quote = state.fee_policy.quote(
        &fiat_amount,
        owner.fee_percent,
        &owner.fee_min_fiat_threshold,
        rate,
    )?;

    Ok(Json(json!({
        "owner_id": owner.id,
        "fiat_amount": fiat_amount,
        "rate": rate,
        "charged_units": quote.charged_units,
        "applied_percent": quote.applied_percent,
        "total_units": quote.total_units,
    })))
}
