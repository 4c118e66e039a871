//! Core types for magnet-mirror

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// State of a torrent transfer as reported by the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Added to the session, nothing fetched yet
    #[default]
    Pending,
    /// Waiting for torrent metadata from the swarm
    FetchingMetadata,
    /// Actively downloading payload data
    Downloading,
    /// Fully fetched; offering data to peers (terminal success)
    Seeding,
    /// The transfer failed (terminal)
    Failed,
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferState::Pending => "pending",
            TransferState::FetchingMetadata => "fetching metadata",
            TransferState::Downloading => "downloading",
            TransferState::Seeding => "seeding",
            TransferState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time status of a transfer, sampled once per poll tick
///
/// Produced by [`TorrentHandle::status`](crate::transfer::TorrentHandle::status)
/// and consumed by the transfer engine to render progress text.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransferSnapshot {
    /// Engine state at sample time
    pub state: TransferState,
    /// Completion percentage in `[0, 100]`
    pub progress: f64,
    /// Download rate in bytes per second
    pub download_rate: f64,
    /// Upload rate in bytes per second
    pub upload_rate: f64,
    /// Number of connected peers
    pub peers: u32,
    /// Total payload size in bytes (0 until metadata is known)
    pub total_bytes: u64,
    /// Bytes downloaded so far
    pub downloaded_bytes: u64,
}

impl TransferSnapshot {
    /// Estimated time to completion at the current download rate.
    ///
    /// Returns `None` when the rate is zero (the renderer shows
    /// "calculating..." in that case).
    pub fn eta(&self) -> Option<Duration> {
        if self.download_rate <= 0.0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.downloaded_bytes);
        Some(Duration::from_secs_f64(remaining as f64 / self.download_rate))
    }
}

/// Pipeline stage, used for logging and stage-scoped reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Torrent download
    Download,
    /// Directory archiving
    Archive,
    /// Provider upload
    Upload,
}

/// Upload provider identity, in fallback-chain priority order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// gofile.io
    GoFile,
    /// buzzheavier.com
    BuzzHeavier,
    /// pixeldrain.com
    PixelDrain,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::GoFile => "gofile",
            ProviderKind::BuzzHeavier => "buzzheavier",
            ProviderKind::PixelDrain => "pixeldrain",
        };
        write!(f, "{s}")
    }
}

/// Result of a completed torrent download
#[derive(Clone, Debug)]
pub struct CompletedTransfer {
    /// Display name extracted from the magnet URI
    pub name: String,
    /// Directory the payload was written into
    pub save_path: PathBuf,
    /// Wall-clock time from start to seeding
    pub elapsed: Duration,
}

/// Outcome of the archive stage
///
/// Skips and tool failures are ordinary outcomes, not run-fatal errors:
/// in both cases the pipeline uploads the original content unmodified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Subdirectories were folded into an archive at this path
    Archived(PathBuf),
    /// Nothing to archive; upload proceeds on the original content
    Skipped {
        /// Why the archive stage did nothing
        reason: SkipReason,
    },
    /// The archive tool failed; upload degraded to the original content
    Failed {
        /// What the tool reported
        reason: String,
    },
}

/// Why the archiver declined to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The root path is a plain file, not a directory
    NotADirectory,
    /// The download root is empty
    EmptyRoot,
    /// The root contains files but no subdirectories
    NoSubdirectories,
    /// Subdirectories exist but hold no files
    NoFilesInSubdirectories,
    /// Archiving is disabled by configuration
    Disabled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NotADirectory => "root path is not a directory",
            SkipReason::EmptyRoot => "download root is empty",
            SkipReason::NoSubdirectories => "no subdirectories to compress",
            SkipReason::NoFilesInSubdirectories => "no files to compress",
            SkipReason::Disabled => "archiving disabled",
        };
        write!(f, "{s}")
    }
}

/// Successful upload result
#[derive(Clone, Debug)]
pub struct UploadReceipt {
    /// Provider that accepted the file
    pub provider: ProviderKind,
    /// Public download link returned by the provider
    pub link: String,
    /// Name of the uploaded file
    pub file_name: String,
    /// Size of the uploaded file in bytes
    pub size: u64,
    /// Wall-clock time spent uploading (including per-provider retries)
    pub elapsed: Duration,
}

/// Final report for a completed pipeline run
#[derive(Clone, Debug)]
pub struct PipelineReport {
    /// Display name of the mirrored payload
    pub name: String,
    /// Download outcome
    pub transfer: CompletedTransfer,
    /// Whether the payload was archived before upload
    pub archive: ArchiveOutcome,
    /// Upload outcome
    pub upload: UploadReceipt,
}
