//! End-to-end mirror orchestration
//!
//! [`MirrorPipeline::run`] drives one magnet through download, optional
//! archiving, and upload, reporting progress through a single chat message
//! the whole way. Error propagation policy:
//! - transfer-engine failures and user interrupts abort the run
//! - an archiver failure or skip degrades to uploading the original content
//! - a provider failure falls through the provider chain
//! - notification failures are logged and never abort anything
//!
//! Cleanup is unconditional: the torrent session is shut down and the
//! reporter flushed with a terminal message on every exit path.

use crate::archive::Archiver;
use crate::config::Config;
use crate::error::{Error, Result, UploadError};
use crate::notify::{NotificationChannel, ProgressReporter};
use crate::render;
use crate::transfer::{TorrentSession, TransferEngine};
use crate::types::{ArchiveOutcome, CompletedTransfer, PipelineReport, SkipReason, Stage};
use crate::upload::UploadPipeline;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// One-magnet mirror pipeline over a torrent session
pub struct MirrorPipeline<S: TorrentSession> {
    config: Config,
    session: S,
    cancel: CancellationToken,
}

impl<S: TorrentSession> MirrorPipeline<S> {
    /// Create a pipeline over a validated configuration
    pub fn new(config: Config, session: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that interrupts the run when cancelled.
    ///
    /// Wire this to signal handling; cancelling mid-run still performs the
    /// full cleanup sequence.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mirror one magnet link end to end.
    ///
    /// On success the returned report carries the public download link.
    /// Whatever happens, the torrent session is shut down and the chat
    /// message is left showing the terminal state.
    pub async fn run(&self, magnet: &str) -> Result<PipelineReport> {
        let channel = NotificationChannel::new(self.config.notify.clone())?;
        let reporter = ProgressReporter::new(channel, self.config.notify.min_edit_interval);

        let result = self.run_stages(magnet, &reporter).await;

        if let Err(e) = self.session.shutdown().await {
            tracing::warn!(error = %e, "torrent session shutdown failed");
        }

        // Stage code publishes its own terminal text for upload outcomes;
        // everything else gets its terminal message here so the flush in
        // close() always delivers the true final state.
        let final_text = match &result {
            Ok(_) => None,
            Err(Error::Interrupted) => Some(render::interrupted()),
            Err(Error::Transfer(e)) => Some(render::download_failed(&e.to_string())),
            Err(Error::Upload(_)) => None,
            Err(e) => Some(render::run_error(&e.to_string())),
        };
        reporter.close(final_text).await;

        result
    }

    async fn run_stages(&self, magnet: &str, reporter: &ProgressReporter) -> Result<PipelineReport> {
        tracing::debug!(stage = ?Stage::Download, "entering stage");
        let engine = TransferEngine::new(&self.session, &self.config.transfer, reporter, &self.cancel);
        let transfer = engine.download(magnet).await?;

        tracing::debug!(stage = ?Stage::Archive, "entering stage");
        let content_root = resolve_content_root(&transfer);
        let (archive, target) = self.archive_stage(reporter, &content_root, &transfer.name).await?;
        let was_compressed = matches!(archive, ArchiveOutcome::Archived(_));

        let target = match target {
            Some(path) => path,
            None => {
                reporter.publish(render::nothing_to_upload());
                return Err(UploadError::FileMissing { path: content_root }.into());
            }
        };

        tracing::debug!(stage = ?Stage::Upload, "entering stage");
        let uploader = UploadPipeline::new(&self.config.upload, reporter, &self.cancel)?;
        let upload = match uploader.upload(&target, was_compressed).await {
            Ok(receipt) => receipt,
            Err(e @ Error::Interrupted) => return Err(e),
            Err(e) => {
                reporter.publish(render::upload_failed(&e.to_string(), was_compressed));
                return Err(e);
            }
        };

        reporter.publish(render::final_success(
            &upload.file_name,
            &upload.link,
            upload.size,
            upload.provider,
            was_compressed,
            transfer.elapsed,
            upload.elapsed,
        ));

        Ok(PipelineReport {
            name: transfer.name.clone(),
            transfer,
            archive,
            upload,
        })
    }

    /// Run the archiver and pick the upload target.
    ///
    /// Returns the archive outcome together with the file to upload, or
    /// `None` when the download produced nothing uploadable.
    async fn archive_stage(
        &self,
        reporter: &ProgressReporter,
        content_root: &Path,
        name: &str,
    ) -> Result<(ArchiveOutcome, Option<PathBuf>)> {
        let archiver = Archiver::new(&self.config.archive, reporter, &self.cancel);
        let outcome = match archiver.archive(content_root, name).await {
            Ok(outcome) => outcome,
            Err(e @ Error::Interrupted) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "archive stage failed, uploading original content");
                reporter.publish(render::compress_failed(&e.to_string()));
                ArchiveOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        match outcome {
            ArchiveOutcome::Archived(path) => {
                Ok((ArchiveOutcome::Archived(path.clone()), Some(path)))
            }
            ArchiveOutcome::Skipped { reason } => {
                if reason == SkipReason::NotADirectory && content_root.is_file() {
                    // Single-file payload, uploaded as-is.
                    return Ok((
                        ArchiveOutcome::Skipped { reason },
                        Some(content_root.to_path_buf()),
                    ));
                }
                reporter.publish(render::compress_skipped(&reason.to_string()));
                let fallback = pick_fallback_file(content_root);
                Ok((ArchiveOutcome::Skipped { reason }, fallback))
            }
            ArchiveOutcome::Failed { reason } => {
                let fallback = pick_fallback_file(content_root);
                Ok((ArchiveOutcome::Failed { reason }, fallback))
            }
        }
    }
}

/// Where the downloaded payload actually lives.
///
/// The engine writes the torrent content under the save path using the
/// transfer's name. A single-file torrent yields a file at that path; a
/// multi-file torrent yields a directory. If neither exists the save path
/// itself is used.
fn resolve_content_root(transfer: &CompletedTransfer) -> PathBuf {
    let named = transfer.save_path.join(&transfer.name);
    if named.exists() {
        named
    } else {
        transfer.save_path.clone()
    }
}

/// Largest file under `root`, for uploads that bypass the archiver.
///
/// A root that is itself a file is its own fallback.
fn pick_fallback_file(root: &Path) -> Option<PathBuf> {
    if root.is_file() {
        return Some(root.to_path_buf());
    }
    let mut best: Option<(u64, PathBuf)> = None;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if best.as_ref().map_or(true, |(s, _)| size > *s) {
                    best = Some((size, entry.path()));
                }
            }
        }
    }
    best.map(|(_, path)| path)
}
