//! # magnet-mirror
//!
//! Backend library for mirroring magnet links to public file hosts: the
//! payload is downloaded over BitTorrent, its subdirectories are optionally
//! folded into a single 7z archive, and the result is uploaded through a
//! provider fallback chain while a chat bot message tracks progress in
//! place.
//!
//! ## Design Philosophy
//!
//! magnet-mirror is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Engine-agnostic** - Bring your own BitTorrent engine behind the
//!   [`TorrentSession`] trait
//! - **Degrading, not failing** - Archiver trouble falls back to uploading
//!   the original content, a dead provider falls through to the next one,
//!   and notification failures never abort a run
//! - **Clean under interrupt** - Cancellation tears the torrent session
//!   down and leaves the chat message showing the terminal state
//!
//! ## Quick Start
//!
//! ```no_run
//! use magnet_mirror::{Config, MirrorPipeline, NotifyConfig, run_with_shutdown};
//! # use magnet_mirror::transfer::{SessionSettings, TorrentHandle, TorrentSession};
//! # use magnet_mirror::types::TransferSnapshot;
//! # struct MySession;
//! # struct MyHandle;
//! # #[async_trait::async_trait]
//! # impl TorrentHandle for MyHandle {
//! #     async fn is_valid(&self) -> bool { true }
//! #     async fn has_metadata(&self) -> bool { true }
//! #     async fn status(&self) -> TransferSnapshot { TransferSnapshot::default() }
//! # }
//! # #[async_trait::async_trait]
//! # impl TorrentSession for MySession {
//! #     type Handle = MyHandle;
//! #     async fn add_magnet(
//! #         &self,
//! #         _: &str,
//! #         _: &std::path::Path,
//! #         _: &SessionSettings,
//! #     ) -> magnet_mirror::Result<MyHandle> { Ok(MyHandle) }
//! #     async fn shutdown(&self) -> magnet_mirror::Result<()> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         notify: NotifyConfig {
//!             bot_token: "123456:ABC".to_string(),
//!             chat_id: "-1001234567890".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let session = MySession; // any TorrentSession implementation
//!     let pipeline = MirrorPipeline::new(config, session)?;
//!
//!     // Run with automatic signal handling
//!     let report = run_with_shutdown(pipeline, "magnet:?xt=urn:btih:...").await?;
//!     println!("mirrored to {}", report.upload.link);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Directory archiving via 7z
pub mod archive;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Chat notification channel and progress reporting
pub mod notify;
/// End-to-end mirror orchestration
pub mod pipeline;
/// Status message rendering
pub mod render;
/// Torrent transfer engine
pub mod transfer;
/// Core types
pub mod types;
/// Provider upload pipeline
pub mod upload;
/// Formatting utilities
pub mod utils;

// Re-export commonly used types
pub use archive::Archiver;
pub use config::{ArchiveConfig, Config, NotifyConfig, TransferConfig, UploadConfig};
pub use error::{ArchiveError, Error, NotifyError, Result, TransferError, UploadError};
pub use notify::{MessageHandle, NotificationChannel, ProgressReporter};
pub use pipeline::MirrorPipeline;
pub use transfer::{SessionSettings, TorrentHandle, TorrentSession, TransferEngine};
pub use types::{
    ArchiveOutcome, CompletedTransfer, PipelineReport, ProviderKind, SkipReason, Stage,
    TransferSnapshot, TransferState, UploadReceipt,
};
pub use upload::UploadPipeline;

/// Helper function to run a pipeline with graceful signal handling.
///
/// The run is cancelled when a termination signal arrives; the pipeline
/// then performs its normal cleanup (session shutdown, terminal chat
/// message) before this returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown<S: TorrentSession>(
    pipeline: MirrorPipeline<S>,
    magnet: &str,
) -> Result<PipelineReport> {
    let cancel = pipeline.cancellation_token();
    let watcher = tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    });

    let result = pipeline.run(magnet).await;
    watcher.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
