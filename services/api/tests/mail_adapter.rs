//! HTTP mail adapter tests with wiremock.

use std::time::Duration;

use api_lib::adapters::HttpMailAdapter;
use lending_core::{MailService, PortError, ReminderKind, ReminderPayload};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(to: &str) -> ReminderPayload {
    ReminderPayload {
        to: to.to_string(),
        subject: "【KASANE】至急：返却期限超過のお知らせ（1営業日経過）".to_string(),
        body: "山田 太郎 様".to_string(),
        kind: ReminderKind::AfterDue,
    }
}

fn adapter(server: &MockServer, timeout: Duration) -> HttpMailAdapter {
    HttpMailAdapter::new(
        format!("{}/send", server.uri()),
        Some("test-token".to_string()),
        "ict@example.com".to_string(),
        timeout,
    )
    .expect("Failed to build mail adapter")
}

#[tokio::test]
async fn posts_json_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "from": "ict@example.com",
            "to": "yamada@example.com",
            "kind": "1day_after",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let delivered = adapter(&server, Duration::from_secs(5))
        .send(&payload("yamada@example.com"))
        .await
        .expect("send should not error");
    assert!(delivered);
}

#[tokio::test]
async fn provider_rejection_is_a_soft_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let delivered = adapter(&server, Duration::from_secs(5))
        .send(&payload("yamada@example.com"))
        .await
        .expect("send should not error");
    assert!(!delivered);
}

#[tokio::test]
async fn timeout_is_a_soft_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let delivered = adapter(&server, Duration::from_millis(100))
        .send(&payload("yamada@example.com"))
        .await
        .expect("send should not error");
    assert!(!delivered);
}

#[tokio::test]
async fn invalid_recipient_never_reaches_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = adapter(&server, Duration::from_secs(5))
        .send(&payload(""))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::InvalidPayload(_)));
}
