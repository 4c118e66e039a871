//! Throttled, deduplicating progress reporting
//!
//! The reporter is the synchronization point between the fast-polling stage
//! loops and the rate-limited chat API. [`ProgressReporter::publish`] is
//! non-blocking: it writes the newest rendered text into a single-slot
//! mailbox (a `watch` channel). A dedicated drain task delivers at its own
//! throttled cadence, dropping superseded intermediate text but never the
//! final state. The poll loops are therefore never starved by a stuck or
//! slow notification call.
//!
//! Delivery rules:
//! - text identical to the last delivered text is suppressed entirely
//! - successive edits are spaced at least `min_edit_interval` apart
//! - with no message handle yet, delivery degrades to sending a new message
//! - an edit that fails after channel-level retries falls back to sending a
//!   brand-new message, which becomes the new message identity

use super::channel::{MessageHandle, NotificationChannel};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle for publishing status text; owns the background drain task
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<Option<String>>,
    drain: JoinHandle<()>,
}

impl ProgressReporter {
    /// Spawn the drain task for a channel
    pub fn new(channel: NotificationChannel, min_edit_interval: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let drain = tokio::spawn(drain_loop(channel, rx, min_edit_interval));
        Self { tx, drain }
    }

    /// Publish the newest status text without blocking.
    ///
    /// Text byte-identical to the current slot content is ignored, so
    /// redundant publishes cause no wakeup and no network call.
    pub fn publish(&self, text: impl Into<String>) {
        let text = text.into();
        self.tx.send_if_modified(|slot| {
            if slot.as_deref() == Some(text.as_str()) {
                false
            } else {
                *slot = Some(text);
                true
            }
        });
    }

    /// Flush the final state and stop the drain task.
    ///
    /// If `final_text` is given it is published first; the drain task always
    /// delivers the last slot content before exiting, so the terminal
    /// message is never dropped.
    pub async fn close(self, final_text: Option<String>) {
        if let Some(text) = final_text {
            self.publish(text);
        }
        let Self { tx, drain } = self;
        drop(tx);
        if let Err(e) = drain.await {
            tracing::warn!(error = %e, "reporter drain task panicked");
        }
    }
}

async fn drain_loop(
    channel: NotificationChannel,
    mut rx: watch::Receiver<Option<String>>,
    min_edit_interval: Duration,
) {
    let mut handle: Option<MessageHandle> = None;
    let mut last_delivered: Option<String> = None;
    let mut last_sent_at: Option<Instant> = None;

    loop {
        let closed = rx.changed().await.is_err();

        let mut pending = rx.borrow_and_update().clone();
        if let Some(text) = pending.take() {
            if last_delivered.as_deref() != Some(text.as_str()) {
                if let Some(at) = last_sent_at {
                    let since = at.elapsed();
                    if since < min_edit_interval {
                        tokio::time::sleep(min_edit_interval - since).await;
                    }
                }

                // Re-read after the throttle sleep: anything superseded
                // while waiting is dropped, only the newest text goes out.
                let text = rx.borrow_and_update().clone().unwrap_or(text);
                if last_delivered.as_deref() != Some(text.as_str()) {
                    last_sent_at = Some(Instant::now());
                    if deliver(&channel, &mut handle, &text).await {
                        last_delivered = Some(text);
                    }
                }
            }
        }

        if closed {
            break;
        }
    }
}

/// Send or edit, returning whether the text landed.
///
/// Failures are logged and swallowed: notification failure must never
/// abort the pipeline.
async fn deliver(
    channel: &NotificationChannel,
    handle: &mut Option<MessageHandle>,
    text: &str,
) -> bool {
    match handle {
        None => match channel.send(text).await {
            Ok(new) => {
                *handle = Some(new);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to send status message");
                false
            }
        },
        Some(current) => match channel.edit(current, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "edit failed, sending replacement message");
                match channel.send(text).await {
                    Ok(new) => {
                        // The replacement becomes the new message identity.
                        *handle = Some(new);
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "replacement send failed");
                        false
                    }
                }
            }
        },
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel_for(server: &MockServer) -> NotificationChannel {
        NotificationChannel::new(NotifyConfig {
            bot_token: "42:TEST".into(),
            chat_id: "-1001".into(),
            api_base: server.uri(),
            retry_delay: Duration::from_millis(20),
            edit_retries: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn send_ok(message_id: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": message_id}
        }))
    }

    #[tokio::test]
    async fn identical_text_produces_at_most_one_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(send_ok(1))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/editMessageText"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(0)
            .mount(&server)
            .await;

        let reporter = ProgressReporter::new(channel_for(&server), Duration::from_millis(10));
        reporter.publish("same text");
        tokio::time::sleep(Duration::from_millis(100)).await;
        reporter.publish("same text");
        reporter.close(None).await;
    }

    #[tokio::test]
    async fn first_delivery_degrades_to_send_then_edits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(send_ok(7))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/editMessageText"))
            .and(body_partial_json(json!({"message_id": 7})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = ProgressReporter::new(channel_for(&server), Duration::from_millis(10));
        reporter.publish("first");
        tokio::time::sleep(Duration::from_millis(100)).await;
        reporter.publish("second");
        reporter.close(None).await;
    }

    #[tokio::test]
    async fn rapid_updates_never_drop_the_final_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(send_ok(7))
            .mount(&server)
            .await;
        // The final state must go out even though intermediate updates
        // arrive well inside the throttle interval.
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/editMessageText"))
            .and(body_partial_json(json!({"text": "progress 100%"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/editMessageText"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let reporter = ProgressReporter::new(channel_for(&server), Duration::from_millis(200));
        reporter.publish("progress 10%");
        reporter.publish("progress 50%");
        reporter.publish("progress 99%");
        reporter.publish("progress 100%");
        reporter.close(None).await;
    }

    #[tokio::test]
    async fn failed_edit_falls_back_to_a_new_message_identity() {
        let server = MockServer::start().await;
        // First send creates message 1; edits always fail; fallback send
        // creates message 2 which becomes the identity for later edits.
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(send_ok(1))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .respond_with(send_ok(2))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/editMessageText"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reporter = ProgressReporter::new(channel_for(&server), Duration::from_millis(10));
        reporter.publish("first");
        tokio::time::sleep(Duration::from_millis(100)).await;
        reporter.publish("second");
        reporter.close(None).await;

        // Two sendMessage calls happened: initial + fallback.
        let sends = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/sendMessage"))
            .count();
        assert_eq!(sends, 2, "fallback should create a replacement message");
    }

    #[tokio::test]
    async fn close_flushes_final_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot42:TEST/sendMessage"))
            .and(body_partial_json(json!({"text": "⚠️ User interrupted"})))
            .respond_with(send_ok(1))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = ProgressReporter::new(channel_for(&server), Duration::from_millis(10));
        reporter
            .close(Some("⚠️ User interrupted".to_string()))
            .await;
    }
}
