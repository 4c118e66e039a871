//! Multi-provider upload pipeline
//!
//! Providers are tried in configured priority order; each gets a bounded
//! number of attempts with a linearly increasing backoff before the chain
//! falls through to the next one. Files over the configured size ceiling
//! are rejected before any network traffic.

mod providers;

use crate::config::UploadConfig;
use crate::error::{Error, Result, UploadError};
use crate::notify::ProgressReporter;
use crate::render;
use crate::types::{ProviderKind, UploadReceipt};
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Uploads a single file through the provider fallback chain
pub struct UploadPipeline<'a> {
    config: &'a UploadConfig,
    reporter: &'a ProgressReporter,
    cancel: &'a CancellationToken,
    client: reqwest::Client,
}

impl<'a> UploadPipeline<'a> {
    /// Create an upload pipeline borrowing the config and reporter.
    ///
    /// The HTTP client carries no overall request timeout: multi-gigabyte
    /// uploads legitimately run for a long time. Connection establishment
    /// is still bounded.
    pub fn new(
        config: &'a UploadConfig,
        reporter: &'a ProgressReporter,
        cancel: &'a CancellationToken,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config,
            reporter,
            cancel,
            client,
        })
    }

    /// Upload `path` to the first provider that accepts it.
    ///
    /// `was_compressed` only affects the wording of status messages.
    pub async fn upload(&self, path: &Path, was_compressed: bool) -> Result<UploadReceipt> {
        let metadata = tokio::fs::metadata(path).await.map_err(|_| {
            Error::from(UploadError::FileMissing {
                path: path.to_path_buf(),
            })
        })?;
        if !metadata.is_file() {
            return Err(UploadError::FileMissing {
                path: path.to_path_buf(),
            }
            .into());
        }

        let size = metadata.len();
        if size > self.config.max_file_size {
            tracing::warn!(
                size,
                limit = self.config.max_file_size,
                "file exceeds the upload ceiling, rejecting without network calls"
            );
            return Err(UploadError::TooLarge {
                size,
                limit: self.config.max_file_size,
            }
            .into());
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let started = Instant::now();
        for &provider in &self.config.providers {
            self.reporter
                .publish(render::uploading(provider, was_compressed));
            match self.try_provider(provider, path, &file_name, size).await? {
                Some(link) => {
                    let elapsed = started.elapsed();
                    tracing::info!(
                        %provider,
                        link = %link,
                        size,
                        elapsed_secs = elapsed.as_secs_f64(),
                        "upload complete"
                    );
                    return Ok(UploadReceipt {
                        provider,
                        link,
                        file_name,
                        size,
                        elapsed,
                    });
                }
                None => {
                    tracing::warn!(%provider, "provider exhausted, falling through");
                }
            }
        }

        Err(UploadError::AllProvidersFailed {
            tried: self.config.providers.len(),
        }
        .into())
    }

    /// Run the bounded attempt loop for one provider.
    ///
    /// Returns `Ok(Some(link))` on success, `Ok(None)` when the provider is
    /// exhausted, and `Err` only for interrupts.
    async fn try_provider(
        &self,
        provider: ProviderKind,
        path: &Path,
        file_name: &str,
        size: u64,
    ) -> Result<Option<String>> {
        for attempt in 1..=self.config.attempts_per_provider {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
            match providers::upload_to(&self.client, self.config, provider, path, file_name, size)
                .await
            {
                Ok(link) => return Ok(Some(link)),
                Err(e) => {
                    tracing::warn!(
                        %provider,
                        attempt,
                        max_attempts = self.config.attempts_per_provider,
                        error = %e,
                        "upload attempt failed"
                    );
                    if attempt < self.config.attempts_per_provider {
                        // Linear backoff: attempt N waits N * base.
                        let delay = self.config.retry_delay * attempt;
                        tokio::select! {
                            _ = self.cancel.cancelled() => return Err(Error::Interrupted),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::notify::NotificationChannel;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quiet_reporter() -> ProgressReporter {
        let channel = NotificationChannel::new(NotifyConfig {
            bot_token: "t".into(),
            chat_id: "c".into(),
            api_base: "http://127.0.0.1:9".into(),
            send_retries: 1,
            edit_retries: 1,
            retry_delay: Duration::from_millis(1),
            request_timeout: Duration::from_millis(50),
            ..Default::default()
        })
        .unwrap();
        ProgressReporter::new(channel, Duration::from_millis(1))
    }

    fn fast_config(server: &MockServer) -> UploadConfig {
        UploadConfig {
            gofile_base: server.uri(),
            buzzheavier_base: server.uri(),
            pixeldrain_base: server.uri(),
            retry_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn payload_file(bytes: usize) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("show.7z");
        std::fs::write(&file, vec![0u8; bytes]).unwrap();
        (dir, file)
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_with_zero_network_calls() {
        let server = MockServer::start().await;
        // Any request at all fails the test.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = fast_config(&server);
        config.max_file_size = 100;
        let (_dir, file) = payload_file(101);

        let reporter = quiet_reporter();
        let cancel = CancellationToken::new();
        let pipeline = UploadPipeline::new(&config, &reporter, &cancel).unwrap();
        let err = pipeline.upload(&file, true).await.unwrap_err();
        reporter.close(None).await;

        assert!(matches!(
            err,
            Error::Upload(UploadError::TooLarge {
                size: 101,
                limit: 100
            })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let server = MockServer::start().await;
        let config = fast_config(&server);
        let reporter = quiet_reporter();
        let cancel = CancellationToken::new();
        let pipeline = UploadPipeline::new(&config, &reporter, &cancel).unwrap();

        let err = pipeline
            .upload(Path::new("/does/not/exist.7z"), false)
            .await
            .unwrap_err();
        reporter.close(None).await;
        assert!(matches!(
            err,
            Error::Upload(UploadError::FileMissing { .. })
        ));
    }

    #[tokio::test]
    async fn failing_provider_falls_through_in_priority_order() {
        let server = MockServer::start().await;
        // gofile always fails, buzzheavier accepts.
        Mock::given(method("POST"))
            .and(url_path("/uploadFile"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(url_path("/show.7z"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "code": 201,
                "data": {"id": "bz1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = fast_config(&server);
        let (_dir, file) = payload_file(10);
        let reporter = quiet_reporter();
        let cancel = CancellationToken::new();
        let pipeline = UploadPipeline::new(&config, &reporter, &cancel).unwrap();

        let receipt = pipeline.upload(&file, true).await.unwrap();
        reporter.close(None).await;

        assert_eq!(receipt.provider, ProviderKind::BuzzHeavier);
        assert_eq!(receipt.link, "https://buzzheavier.com/bz1");
        assert_eq!(receipt.size, 10);
        assert_eq!(receipt.file_name, "show.7z");
    }

    #[tokio::test]
    async fn first_provider_success_stops_the_chain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/uploadFile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": {"downloadPage": "https://gofile.io/d/ok"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let config = fast_config(&server);
        let (_dir, file) = payload_file(10);
        let reporter = quiet_reporter();
        let cancel = CancellationToken::new();
        let pipeline = UploadPipeline::new(&config, &reporter, &cancel).unwrap();

        let receipt = pipeline.upload(&file, false).await.unwrap();
        reporter.close(None).await;
        assert_eq!(receipt.provider, ProviderKind::GoFile);
        assert_eq!(receipt.link, "https://gofile.io/d/ok");
    }

    #[tokio::test]
    async fn exhausting_every_provider_reports_the_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = fast_config(&server);
        config.attempts_per_provider = 1;
        let (_dir, file) = payload_file(10);
        let reporter = quiet_reporter();
        let cancel = CancellationToken::new();
        let pipeline = UploadPipeline::new(&config, &reporter, &cancel).unwrap();

        let err = pipeline.upload(&file, true).await.unwrap_err();
        reporter.close(None).await;
        assert!(matches!(
            err,
            Error::Upload(UploadError::AllProvidersFailed { tried: 3 })
        ));
    }

    #[tokio::test]
    async fn cancellation_interrupts_between_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = fast_config(&server);
        config.retry_delay = Duration::from_secs(10);
        let (_dir, file) = payload_file(10);
        let reporter = quiet_reporter();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let pipeline = UploadPipeline::new(&config, &reporter, &cancel).unwrap();
        let err = pipeline.upload(&file, true).await.unwrap_err();
        reporter.close(None).await;
        assert!(matches!(err, Error::Interrupted));
    }
}
