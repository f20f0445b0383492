//! Webhook dispatcher.
//!
//! Best-effort, signed, fire-and-forget notification of ledger events.
//! `emit` spawns the whole dispatch so it can never block or fail the
//! ledger mutation that triggered it; delivery failures are logged, not
//! retried.

use chrono::Utc;
use futures::future::join_all;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::json;
use sha2::Sha256;
use sqlx::PgPool;
use std::time::Duration;

use crate::db::models::WebhookRegistration;
use crate::db::queries;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_TRANSACTION_CREATED: &str = "transaction.created";
pub const EVENT_TRANSACTION_STATUS_CHANGED: &str = "transaction.status_changed";

/// Events a registration may subscribe to, next to the wildcard.
pub const ALLOWED_EVENTS: [&str; 3] = [
    EVENT_TRANSACTION_CREATED,
    EVENT_TRANSACTION_STATUS_CHANGED,
    "*",
];

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Hex HMAC-SHA256 over the serialized envelope body.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the delivery headers for one registration: event metadata, the
/// signature when a secret is set, plus the registration's literal extras.
fn delivery_headers(registration: &WebhookRegistration, event: &str, body: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(event) {
        headers.insert(HeaderName::from_static("x-ledger-event"), value);
    }
    if let Ok(value) = HeaderValue::from_str(&registration.id.to_string()) {
        headers.insert(HeaderName::from_static("x-ledger-webhook-id"), value);
    }
    if let Some(secret) = &registration.secret {
        if let Ok(value) = HeaderValue::from_str(&sign(secret, body.as_bytes())) {
            headers.insert(HeaderName::from_static("x-ledger-signature"), value);
        }
    }
    if let Some(extra) = registration.extra_headers.as_object() {
        for (key, value) in extra {
            let literal = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(&literal),
            ) {
                headers.insert(name, value);
            }
        }
    }
    headers
}

/// One delivery attempt. Outcome is logged; nothing propagates.
pub async fn deliver(
    client: &reqwest::Client,
    registration: &WebhookRegistration,
    event: &str,
    body: &str,
) {
    let headers = delivery_headers(registration, event, body);
    let result = client
        .post(&registration.target_url)
        .headers(headers)
        .body(body.to_string())
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::info!(
                webhook = %registration.id,
                name = %registration.name,
                event,
                "webhook delivered"
            );
        }
        Ok(response) => {
            tracing::error!(
                webhook = %registration.id,
                name = %registration.name,
                event,
                status = %response.status(),
                "webhook endpoint rejected delivery"
            );
        }
        Err(e) => {
            tracing::error!(
                webhook = %registration.id,
                name = %registration.name,
                event,
                error = %e,
                "webhook delivery failed"
            );
        }
    }
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    pool: PgPool,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(pool: PgPool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("client build");
        Self { pool, client }
    }

    /// Fire-and-forget relative to the caller's commit: the lookup and all
    /// deliveries run in a spawned task, outside any lock.
    pub fn emit(&self, event: &str, payload: serde_json::Value) {
        let dispatcher = self.clone();
        let event = event.to_string();
        tokio::spawn(async move {
            dispatcher.dispatch(&event, payload).await;
        });
    }

    async fn dispatch(&self, event: &str, payload: serde_json::Value) {
        let registrations = match queries::active_webhooks_for_event(&self.pool, event).await {
            Ok(regs) => regs,
            Err(e) => {
                tracing::error!(event, error = %e, "failed to load webhook registrations");
                return;
            }
        };
        if registrations.is_empty() {
            return;
        }

        let envelope = json!({
            "event": event,
            "timestamp": Utc::now().to_rfc3339(),
            "data": payload,
        });
        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(event, error = %e, "failed to serialize webhook envelope");
                return;
            }
        };

        join_all(
            registrations
                .iter()
                .map(|registration| deliver(&self.client, registration, event, &body)),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_hex() {
        let sig = sign("secret", br#"{"ok":true}"#);
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, sign("secret", br#"{"ok":true}"#));
        assert_ne!(sig, sign("other", br#"{"ok":true}"#));
    }

    #[test]
    fn allowed_events_include_wildcard() {
        assert!(ALLOWED_EVENTS.contains(&"*"));
        assert!(ALLOWED_EVENTS.contains(&EVENT_TRANSACTION_CREATED));
        assert!(ALLOWED_EVENTS.contains(&EVENT_TRANSACTION_STATUS_CHANGED));
    }
}
