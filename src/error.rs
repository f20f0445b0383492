use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::status::TransitionReject;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("denied: actor lacks the required capability")]
    Denied,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(TransitionReject),

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("busy: row lock not acquired in time, retry")]
    Busy,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

/// Postgres raises 55P03 (lock_not_available) when `lock_timeout` expires;
/// that is the retryable `Busy` case, everything else is a real failure.
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("55P03") {
                return LedgerError::Busy;
            }
        }
        LedgerError::Database(err)
    }
}

impl LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Denied => StatusCode::FORBIDDEN,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Conflict(_) | LedgerError::InsufficientBalance => StatusCode::CONFLICT,
            LedgerError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Retryable errors leave no partial state behind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Busy | LedgerError::InsufficientBalance)
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let error = LedgerError::Validation("amount must be positive".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn denied_maps_to_forbidden() {
        assert_eq!(LedgerError::Denied.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn conflict_maps_to_conflict() {
        let error = LedgerError::Conflict(TransitionReject::AlreadyTerminal);
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn insufficient_balance_maps_to_conflict() {
        assert_eq!(
            LedgerError::InsufficientBalance.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn busy_maps_to_service_unavailable() {
        assert_eq!(LedgerError::Busy.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(LedgerError::Busy.is_retryable());
    }

    #[test]
    fn database_error_maps_to_internal() {
        let error = LedgerError::from(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn conflict_response_carries_status() {
        let error = LedgerError::Conflict(TransitionReject::AlreadyInStatus);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
