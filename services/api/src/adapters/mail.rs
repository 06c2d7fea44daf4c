//! services/api/src/adapters/mail.rs
//!
//! Adapters for the `MailService` port: an HTTP mail-provider client and a
//! log-only sender used when no provider is configured.

use std::time::Duration;

use async_trait::async_trait;
use lending_core::domain::ReminderPayload;
use lending_core::ports::{MailService, PortError, PortResult};
use serde::Serialize;
use tracing::{info, warn};

/// Rejects payloads no provider could ever deliver.
fn validate(payload: &ReminderPayload) -> PortResult<()> {
    let to = payload.to.trim();
    if to.is_empty() || !to.contains('@') {
        return Err(PortError::InvalidPayload(format!(
            "'{}' is not a deliverable address",
            payload.to
        )));
    }
    if payload.subject.trim().is_empty() {
        return Err(PortError::InvalidPayload("subject is empty".to_string()));
    }
    Ok(())
}

//=========================================================================================
// HTTP Mail Provider
//=========================================================================================

/// The JSON body posted to the mail provider.
#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    kind: &'a str,
}

/// Posts reminders as JSON to a transactional-mail HTTP endpoint.
#[derive(Clone)]
pub struct HttpMailAdapter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from: String,
}

impl HttpMailAdapter {
    /// Creates a new `HttpMailAdapter` whose requests time out after `timeout`.
    pub fn new(
        endpoint: String,
        token: Option<String>,
        from: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
            from,
        })
    }
}

#[async_trait]
impl MailService for HttpMailAdapter {
    async fn send(&self, payload: &ReminderPayload) -> PortResult<bool> {
        validate(payload)?;

        let mail = OutgoingMail {
            from: &self.from,
            to: &payload.to,
            subject: &payload.subject,
            body: &payload.body,
            kind: payload.kind.as_str(),
        };
        let mut request = self.client.post(&self.endpoint).json(&mail);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        // Transport failures and timeouts are ordinary delivery failures.
        match request.send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!(
                    "Mail provider rejected reminder to {}: HTTP {}",
                    payload.to,
                    response.status()
                );
                Ok(false)
            }
            Err(e) => {
                warn!("Mail provider unreachable for reminder to {}: {}", payload.to, e);
                Ok(false)
            }
        }
    }
}

//=========================================================================================
// Log-only Sender
//=========================================================================================

/// Logs reminders instead of delivering them. Always reports success.
#[derive(Clone, Default)]
pub struct LogMailAdapter;

#[async_trait]
impl MailService for LogMailAdapter {
    async fn send(&self, payload: &ReminderPayload) -> PortResult<bool> {
        validate(payload)?;
        info!(
            "[dry run] {} reminder to {}: {}",
            payload.kind, payload.to, payload.subject
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lending_core::ReminderKind;

    fn payload(to: &str) -> ReminderPayload {
        ReminderPayload {
            to: to.to_string(),
            subject: "【KASANE】返却予定日の1営業日前リマインド".to_string(),
            body: "body".to_string(),
            kind: ReminderKind::BeforeDue,
        }
    }

    #[tokio::test]
    async fn log_adapter_accepts_valid_payloads() {
        assert!(LogMailAdapter.send(&payload("sato@example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_recipients_are_errors_not_failures() {
        let err = LogMailAdapter.send(&payload("  ")).await.unwrap_err();
        assert!(matches!(err, PortError::InvalidPayload(_)));
        assert!(LogMailAdapter.send(&payload("no-at-sign")).await.is_err());
    }
}
