use chrono::Utc;
use mockito::{Matcher, Server};
use serde_json::json;
use uuid::Uuid;

use ledger_core::db::models::WebhookRegistration;
use ledger_core::services::webhook::{deliver, sign, EVENT_TRANSACTION_STATUS_CHANGED};

fn registration(target_url: String, secret: Option<&str>) -> WebhookRegistration {
    let now = Utc::now();
    WebhookRegistration {
        id: Uuid::new_v4(),
        name: "ops-hook".to_string(),
        target_url,
        event: "*".to_string(),
        secret: secret.map(str::to_string),
        active: true,
        extra_headers: json!({ "X-Team": "ops" }),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn delivery_carries_signature_and_extra_headers() {
    let mut server = Server::new_async().await;
    let body = json!({
        "event": EVENT_TRANSACTION_STATUS_CHANGED,
        "timestamp": Utc::now().to_rfc3339(),
        "data": { "display_code": "LGR-DEADBEEF", "new_status": "settled" },
    })
    .to_string();

    let hook = registration(format!("{}/hook", server.url()), Some("topsecret"));
    let expected_signature = sign("topsecret", body.as_bytes());

    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_header("x-ledger-event", EVENT_TRANSACTION_STATUS_CHANGED)
        .match_header("x-ledger-webhook-id", hook.id.to_string().as_str())
        .match_header("x-ledger-signature", expected_signature.as_str())
        .match_header("x-team", "ops")
        .match_body(Matcher::Exact(body.clone()))
        .with_status(200)
        .create_async()
        .await;

    let client = reqwest::Client::new();
    deliver(&client, &hook, EVENT_TRANSACTION_STATUS_CHANGED, &body).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn delivery_without_secret_sends_no_signature() {
    let mut server = Server::new_async().await;
    let body = json!({ "event": "transaction.created", "data": {} }).to_string();
    let hook = registration(format!("{}/hook", server.url()), None);

    let mock = server
        .mock("POST", "/hook")
        .match_header("x-ledger-signature", Matcher::Missing)
        .with_status(200)
        .create_async()
        .await;

    let client = reqwest::Client::new();
    deliver(&client, &hook, "transaction.created", &body).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn endpoint_rejection_does_not_panic() {
    let mut server = Server::new_async().await;
    let body = json!({ "event": "transaction.created", "data": {} }).to_string();
    let hook = registration(format!("{}/hook", server.url()), Some("k"));

    let mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .create_async()
        .await;

    let client = reqwest::Client::new();
    // Failure is logged, never propagated.
    deliver(&client, &hook, "transaction.created", &body).await;

    mock.assert_async().await;
}
