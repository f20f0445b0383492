pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod services;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::domain::fee::FeePolicy;
use crate::services::audit::AuditSink;
use crate::services::gate::CapabilityGate;
use crate::services::ledger::LedgerService;
use crate::services::oracle::PriceOracle;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ledger: LedgerService,
    pub gate: CapabilityGate,
    pub oracle: PriceOracle,
    pub audit: AuditSink,
    pub fee_policy: FeePolicy,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transactions", post(handlers::transactions::create))
        .route("/transactions/:id", get(handlers::transactions::get))
        .route(
            "/transactions/:id/status",
            post(handlers::transactions::transition),
        )
        .route("/users", post(handlers::users::create))
        .route("/users/:id", get(handlers::users::get))
        .route("/users/:id/adjust", post(handlers::users::adjust))
        .route("/fees/quote", get(handlers::fees::quote))
        .route(
            "/webhooks",
            get(handlers::webhooks::list).post(handlers::webhooks::create),
        )
        .route(
            "/webhooks/:id",
            get(handlers::webhooks::get)
                .put(handlers::webhooks::update)
                .delete(handlers::webhooks::remove),
        )
        .route("/webhooks/events", get(handlers::webhooks::events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
