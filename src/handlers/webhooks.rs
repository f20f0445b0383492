//! Webhook registration management. Secrets go in but never come back
//! out: responses expose only `has_secret`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;
use uuid::Uuid;

use crate::db::models::WebhookRegistration;
use crate::db::queries;
use crate::domain::capability::Capability;
use crate::error::LedgerError;
use crate::handlers::actor_from_headers;
use crate::services::webhook::ALLOWED_EVENTS;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub name: String,
    pub target_url: String,
    #[serde(default = "default_event")]
    pub event: String,
    pub secret: Option<String>,
    #[serde(default)]
    pub extra_headers: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWebhookRequest {
    pub name: Option<String>,
    pub target_url: Option<String>,
    pub event: Option<String>,
    /// An empty string clears the secret; absent leaves it unchanged.
    pub secret: Option<String>,
    pub active: Option<bool>,
    pub extra_headers: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct WebhookView {
    pub id: Uuid,
    pub name: String,
    pub target_url: String,
    pub event: String,
    pub has_secret: bool,
    pub active: bool,
    pub extra_headers: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookRegistration> for WebhookView {
    fn from(hook: WebhookRegistration) -> Self {
        Self {
            id: hook.id,
            name: hook.name,
            target_url: hook.target_url,
            event: hook.event,
            has_secret: hook.secret.is_some(),
            active: hook.active,
            extra_headers: hook.extra_headers,
            created_at: hook.created_at,
            updated_at: hook.updated_at,
        }
    }
}

fn default_event() -> String {
    "*".to_string()
}

fn validate_name(name: &str) -> Result<String, LedgerError> {
    let name = name.trim();
    if name.len() < 3 {
        return Err(LedgerError::Validation(
            "name must be at least 3 characters".into(),
        ));
    }
    Ok(name.to_string())
}

fn validate_target_url(raw: &str) -> Result<String, LedgerError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| LedgerError::Validation("target_url is not a valid URL".into()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(LedgerError::Validation(
            "target_url must be http or https".into(),
        ));
    }
    Ok(url.to_string())
}

fn validate_event(event: &str) -> Result<String, LedgerError> {
    let event = event.trim();
    if !ALLOWED_EVENTS.contains(&event) {
        return Err(LedgerError::Validation(format!(
            "unknown event '{event}', expected one of {ALLOWED_EVENTS:?}"
        )));
    }
    Ok(event.to_string())
}

/// Keeps only string-valued entries with non-empty keys; anything else in
/// the submitted object is dropped rather than rejected.
fn sanitize_extra_headers(raw: Option<Value>) -> Value {
    let mut clean = Map::new();
    if let Some(Value::Object(entries)) = raw {
        for (key, value) in entries {
            if key.trim().is_empty() {
                continue;
            }
            if let Value::String(s) = value {
                clean.insert(key, Value::String(s));
            }
        }
    }
    Value::Object(clean)
}

fn normalize_secret(secret: Option<String>) -> Option<String> {
    secret.filter(|s| !s.trim().is_empty())
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::ManageConfig).await?;

    let now = Utc::now();
    let hook = WebhookRegistration {
        id: Uuid::new_v4(),
        name: validate_name(&req.name)?,
        target_url: validate_target_url(&req.target_url)?,
        event: validate_event(&req.event)?,
        secret: normalize_secret(req.secret),
        active: true,
        extra_headers: sanitize_extra_headers(req.extra_headers),
        created_at: now,
        updated_at: now,
    };

    let created = queries::insert_webhook(&state.db, &hook).await?;
    tracing::info!(webhook = %created.id, name = %created.name, event = %created.event, "webhook registered");
    state.audit.record(
        &actor.audit_name(),
        "webhook_create",
        Some(json!({ "webhook_id": created.id, "name": created.name, "event": created.event })),
    );
    Ok((StatusCode::CREATED, Json(WebhookView::from(created))))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::Access).await?;

    let hooks = queries::list_webhooks(&state.db).await?;
    let views: Vec<WebhookView> = hooks.into_iter().map(WebhookView::from).collect();
    Ok(Json(views))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::Access).await?;

    let hook = queries::get_webhook(&state.db, id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("webhook {id}")))?;
    Ok(Json(WebhookView::from(hook)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::ManageConfig).await?;

    let mut hook = queries::get_webhook(&state.db, id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("webhook {id}")))?;

    if let Some(name) = req.name {
        hook.name = validate_name(&name)?;
    }
    if let Some(target_url) = req.target_url {
        hook.target_url = validate_target_url(&target_url)?;
    }
    if let Some(event) = req.event {
        hook.event = validate_event(&event)?;
    }
    if let Some(secret) = req.secret {
        hook.secret = normalize_secret(Some(secret));
    }
    if let Some(active) = req.active {
        hook.active = active;
    }
    if let Some(extra) = req.extra_headers {
        hook.extra_headers = sanitize_extra_headers(Some(extra));
    }

    let updated = queries::update_webhook(&state.db, &hook).await?;
    state.audit.record(
        &actor.audit_name(),
        "webhook_update",
        Some(json!({ "webhook_id": updated.id, "active": updated.active })),
    );
    Ok(Json(WebhookView::from(updated)))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = actor_from_headers(&headers)?;
    state.gate.require(&actor, Capability::ManageConfig).await?;

    if !queries::delete_webhook(&state.db, id).await? {
        return Err(LedgerError::NotFound(format!("webhook {id}")));
    }
    state.audit.record(
        &actor.audit_name(),
        "webhook_delete",
        Some(json!({ "webhook_id": id })),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// The event names a registration may subscribe to.
pub async fn events() -> impl IntoResponse {
    Json(json!({ "events": ALLOWED_EVENTS }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_names_and_bad_schemes() {
        assert!(validate_name("  ab ").is_err());
        assert!(validate_name("ops-hook").is_ok());
        assert!(validate_target_url("ftp://example.com/hook").is_err());
        assert!(validate_target_url("not a url").is_err());
        assert!(validate_target_url("https://example.com/hook").is_ok());
    }

    #[test]
    fn rejects_unknown_events() {
        assert!(validate_event("transaction.created").is_ok());
        assert!(validate_event("*").is_ok());
        assert!(validate_event("transaction.deleted").is_err());
    }

    #[test]
    fn extra_headers_keep_only_string_values() {
        let raw = json!({
            "X-Tag": "ops",
            "X-Num": 7,
            "": "dropped",
            "X-Obj": {"nested": true}
        });
        let clean = sanitize_extra_headers(Some(raw));
        assert_eq!(clean, json!({ "X-Tag": "ops" }));
        assert_eq!(sanitize_extra_headers(None), json!({}));
    }

    #[test]
    fn empty_secret_clears() {
        assert_eq!(normalize_secret(Some("  ".into())), None);
        assert_eq!(normalize_secret(Some("k".into())), Some("k".to_string()));
        assert_eq!(normalize_secret(None), None);
    }
}
