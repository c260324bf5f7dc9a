//! Feishu (Lark) custom bot notifications.
//!
//! Messages are posted to the bot's webhook URL. A delivery counts as
//! successful only when the HTTP status is 2xx and the JSON reply carries
//! `code == 0`.

mod card;

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::api::Bug;

pub use card::{bug_card, DEFAULT_HEADER_TEMPLATE};

/// Webhook request timeout in seconds.
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Delivery attempts per bug card.
pub const MAX_CARD_ATTEMPTS: u32 = 3;

/// Errors that can occur when posting to the webhook.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The webhook answered with a non-success HTTP status.
    #[error("Webhook returned HTTP {0}")]
    Http(reqwest::StatusCode),

    /// The webhook answered with a non-zero code.
    #[error("Feishu rejected the message (code {code}): {msg}")]
    Rejected { code: i64, msg: String },
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Posts text and card messages to a Feishu webhook.
#[derive(Debug, Clone)]
pub struct FeishuNotifier {
    client: Client,
    webhook_url: String,
}

impl FeishuNotifier {
    /// Create a notifier for the given webhook.
    pub fn new(webhook_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_http_client(webhook_url, client))
    }

    /// Create a notifier on top of an existing HTTP client.
    pub fn with_http_client(webhook_url: &str, client: Client) -> Self {
        Self {
            client,
            webhook_url: webhook_url.trim().to_string(),
        }
    }

    /// Send a plain text message.
    #[instrument(skip(self, text))]
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.post(&json!({"msg_type": "text", "content": {"text": text}}))
            .await?;
        info!("Feishu text message sent");
        Ok(())
    }

    /// Send an interactive card.
    pub async fn send_card(&self, card: Value) -> Result<()> {
        self.post(&json!({"msg_type": "interactive", "card": card}))
            .await
    }

    /// Send one bug card, retrying up to [`MAX_CARD_ATTEMPTS`] times.
    ///
    /// Returns whether the card was delivered.
    #[instrument(skip(self, bug), fields(bug_id = %bug.id))]
    pub async fn send_bug_card(&self, bug: &Bug, bug_url: &str) -> bool {
        let card = bug_card(bug, bug_url, DEFAULT_HEADER_TEMPLATE);
        for attempt in 1..=MAX_CARD_ATTEMPTS {
            match self.send_card(card.clone()).await {
                Ok(()) => {
                    info!("Bug card sent");
                    return true;
                }
                Err(e) if attempt < MAX_CARD_ATTEMPTS => {
                    warn!("Bug card failed (attempt {}/{}): {}", attempt, MAX_CARD_ATTEMPTS, e);
                }
                Err(e) => {
                    error!("Giving up on bug card after {} attempts: {}", attempt, e);
                }
            }
        }
        false
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Http(status));
        }

        let body: Value = response.json().await?;
        debug!("Webhook response: {}", body);
        let code = body
            .get("code")
            .or_else(|| body.get("StatusCode"))
            .and_then(Value::as_i64)
            .unwrap_or(-1);
        if code != 0 {
            let msg = body
                .get("msg")
                .or_else(|| body.get("StatusMessage"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(NotifyError::Rejected { code, msg });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;

    fn notifier_for(server: &StubServer) -> FeishuNotifier {
        server.notifier()
    }

    fn sample_bug() -> Bug {
        Bug {
            id: "7".to_string(),
            title: "Broken login".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_text() {
        let server = StubServer::start().await;
        server.on("POST", "/hook", 200, json!({"code": 0, "msg": "success"}));

        let notifier = notifier_for(&server);
        notifier.send_text("hello").await.unwrap();

        let body: Value = serde_json::from_str(&server.calls()[0].body).unwrap();
        assert_eq!(body["msg_type"], "text");
        assert_eq!(body["content"]["text"], "hello");
    }

    #[tokio::test]
    async fn test_rejected_code_is_error() {
        let server = StubServer::start().await;
        server.on(
            "POST",
            "/hook",
            200,
            json!({"code": 19001, "msg": "param invalid"}),
        );

        let notifier = notifier_for(&server);
        let err = notifier.send_text("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { code: 19001, .. }));
    }

    #[tokio::test]
    async fn test_legacy_status_code_accepted() {
        let server = StubServer::start().await;
        server.on(
            "POST",
            "/hook",
            200,
            json!({"StatusCode": 0, "StatusMessage": "success"}),
        );

        let notifier = notifier_for(&server);
        assert!(notifier.send_text("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_bug_card_retries_then_succeeds() {
        let server = StubServer::start().await;
        server.on("POST", "/hook", 500, json!({}));
        server.on("POST", "/hook", 200, json!({"code": 0}));

        let notifier = notifier_for(&server);
        assert!(notifier.send_bug_card(&sample_bug(), "http://z/bug-view-7.html").await);

        let calls = server.calls();
        assert_eq!(calls.len(), 2);
        let body: Value = serde_json::from_str(&calls[1].body).unwrap();
        assert_eq!(body["msg_type"], "interactive");
        assert_eq!(body["card"]["header"]["title"]["content"], "Bug #7 - Broken login");
    }

    #[tokio::test]
    async fn test_bug_card_gives_up_after_max_attempts() {
        let server = StubServer::start().await;
        server.on(
            "POST",
            "/hook",
            200,
            json!({"code": 9499, "msg": "Bad Request"}),
        );

        let notifier = notifier_for(&server);
        assert!(!notifier.send_bug_card(&sample_bug(), "u").await);
        assert_eq!(server.calls().len(), MAX_CARD_ATTEMPTS as usize);
    }
}
