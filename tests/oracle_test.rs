use mockito::Server;

use ledger_core::services::oracle::PriceOracle;

const FALLBACK: f64 = 1450.0;

#[tokio::test]
async fn uses_the_quoted_rate_when_sane() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/price")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"tether":{"ars":1234.5}}"#)
        .create_async()
        .await;

    let oracle = PriceOracle::new(format!("{}/price", server.url()), FALLBACK);
    assert_eq!(oracle.conversion_rate().await, 1234.5);
    mock.assert_async().await;
}

#[tokio::test]
async fn caches_the_rate_between_calls() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/price")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"tether":{"ars":1500.0}}"#)
        .expect(1)
        .create_async()
        .await;

    let oracle = PriceOracle::new(format!("{}/price", server.url()), FALLBACK);
    assert_eq!(oracle.conversion_rate().await, 1500.0);
    assert_eq!(oracle.conversion_rate().await, 1500.0);
    mock.assert_async().await;
}

#[tokio::test]
async fn rate_outside_the_band_falls_back() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/price")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"tether":{"ars":99999.0}}"#)
        .create_async()
        .await;

    let oracle = PriceOracle::new(format!("{}/price", server.url()), FALLBACK);
    assert_eq!(oracle.conversion_rate().await, FALLBACK);
}

#[tokio::test]
async fn upstream_error_falls_back_when_nothing_is_cached() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/price")
        .with_status(503)
        .create_async()
        .await;

    let oracle = PriceOracle::new(format!("{}/price", server.url()), FALLBACK);
    assert_eq!(oracle.conversion_rate().await, FALLBACK);
}

#[tokio::test]
async fn malformed_payload_falls_back() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/price")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"bitcoin":{"usd":64000.0}}"#)
        .create_async()
        .await;

    let oracle = PriceOracle::new(format!("{}/price", server.url()), FALLBACK);
    assert_eq!(oracle.conversion_rate().await, FALLBACK);
}
