//! Chat notification channel
//!
//! Thin client for the Telegram-bot-style HTTP contract: `sendMessage`
//! creates a status message, `editMessageText` updates it in place.
//!
//! Retry policy per call:
//! - HTTP 429 → sleep for the server-specified `retry_after` and retry the
//!   same call, without bound (rate limits are transient and the message
//!   must eventually land)
//! - other failures → fixed backoff, bounded attempt budget, then
//!   [`NotifyError::RetriesExhausted`]

use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Identity of the single mutable chat message being edited in place
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHandle(pub i64);

/// Successful `sendMessage` envelope (only the field we need)
#[derive(Debug, Deserialize)]
struct SendResponse {
    result: SentMessage,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// 429 envelope carrying the server-directed delay
#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    #[serde(default)]
    parameters: Option<RetryParameters>,
}

#[derive(Debug, Deserialize)]
struct RetryParameters {
    retry_after: u64,
}

/// HTTP client for the chat notification API
#[derive(Clone, Debug)]
pub struct NotificationChannel {
    client: reqwest::Client,
    config: NotifyConfig,
}

impl NotificationChannel {
    /// Create a channel from notification settings
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Send a new message, returning the handle needed for later edits
    pub async fn send(&self, text: &str) -> Result<MessageHandle> {
        let payload = json!({
            "chat_id": self.config.chat_id,
            "text": text,
        });
        let body = self
            .call("sendMessage", &payload, self.config.send_retries)
            .await?;

        let parsed: SendResponse =
            serde_json::from_str(&body).map_err(|e| NotifyError::MalformedResponse {
                reason: format!("no message_id in sendMessage response: {e}"),
            })?;
        tracing::debug!(message_id = parsed.result.message_id, "status message created");
        Ok(MessageHandle(parsed.result.message_id))
    }

    /// Edit a previously sent message in place
    pub async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": self.config.chat_id,
            "message_id": handle.0,
            "text": text,
        });
        self.call("editMessageText", &payload, self.config.edit_retries)
            .await?;
        Ok(())
    }

    /// Issue one API call with the channel retry policy.
    ///
    /// `max_attempts` bounds non-429 failures only; 429 retries are
    /// unbounded and server-paced.
    async fn call(
        &self,
        method: &str,
        payload: &serde_json::Value,
        max_attempts: u32,
    ) -> Result<String> {
        let url = self.method_url(method);
        let mut failures = 0u32;

        loop {
            let response = match self.client.post(&url).json(payload).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(method, error = %e, "chat API request failed");
                    failures += 1;
                    if failures >= max_attempts {
                        return Err(NotifyError::RetriesExhausted { attempts: failures }.into());
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await.unwrap_or_default());
            }

            let body = response.text().await.unwrap_or_default();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = serde_json::from_str::<RateLimitResponse>(&body)
                    .ok()
                    .and_then(|r| r.parameters)
                    .map(|p| Duration::from_secs(p.retry_after))
                    .unwrap_or(self.config.retry_delay);
                tracing::warn!(
                    method,
                    retry_after_secs = retry_after.as_secs(),
                    "rate limited by chat API"
                );
                tokio::time::sleep(retry_after).await;
                continue;
            }

            tracing::error!(method, status = %status, body = %body, "chat API call failed");
            failures += 1;
            if failures >= max_attempts {
                return Err(NotifyError::RetriesExhausted { attempts: failures }.into());
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: String) -> NotifyConfig {
        NotifyConfig {
            bot_token: "42:TEST".into(),
            chat_id: "-1001".into(),
            api_base,
            retry_delay: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn send_returns_the_message_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .and(body_partial_json(json!({"chat_id": "-1001"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "ok": true,
                    "result": {"message_id": 777}
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let channel = NotificationChannel::new(test_config(server.uri())).unwrap();
        let handle = channel.send("✨ Starting download...").await.unwrap();
        assert_eq!(handle, MessageHandle(777));
    }

    #[tokio::test]
    async fn edit_posts_the_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/editMessageText"))
            .and(body_partial_json(json!({"message_id": 777, "text": "50%"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let channel = NotificationChannel::new(test_config(server.uri())).unwrap();
        channel.edit(&MessageHandle(777), "50%").await.unwrap();
    }

    #[tokio::test]
    async fn rate_limit_sleeps_for_server_directed_delay_then_retries() {
        let server = MockServer::start().await;

        // First call is rate limited with retry_after=5, second succeeds.
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({
                    "ok": false,
                    "parameters": {"retry_after": 5}
                })),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "ok": true,
                    "result": {"message_id": 1}
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let channel = NotificationChannel::new(test_config(server.uri())).unwrap();
        let start = std::time::Instant::now();
        let handle = channel.send("hello").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(handle, MessageHandle(1));
        assert!(
            elapsed >= Duration::from_secs(5),
            "should honor retry_after=5, waited {elapsed:?}"
        );
        assert!(
            elapsed < Duration::from_secs(8),
            "should not wait much longer than retry_after, waited {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn server_errors_exhaust_the_bounded_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = test_config(server.uri());
        config.send_retries = 3;
        let channel = NotificationChannel::new(config).unwrap();

        let err = channel.send("hello").await.unwrap_err();
        match err {
            crate::error::Error::Notify(NotifyError::RetriesExhausted { attempts }) => {
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_message_id_is_a_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let channel = NotificationChannel::new(test_config(server.uri())).unwrap();
        let err = channel.send("hello").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Notify(NotifyError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn rate_limit_without_parameters_falls_back_to_fixed_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({"ok": false})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "ok": true,
                    "result": {"message_id": 2}
                })),
            )
            .mount(&server)
            .await;

        let channel = NotificationChannel::new(test_config(server.uri())).unwrap();
        let start = std::time::Instant::now();
        channel.send("hello").await.unwrap();
        assert!(
            start.elapsed() >= Duration::from_millis(50),
            "should fall back to the fixed retry delay"
        );
    }
}
