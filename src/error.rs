//! Error types for magnet-mirror
//!
//! This module provides the error taxonomy for the pipeline:
//! - Domain-specific error types (Notify, Transfer, Archive, Upload)
//! - A clear split between run-fatal errors (transfer engine lost its
//!   handle, user interrupt) and stage-local errors that the pipeline
//!   degrades around (archiver tool failure, a single provider failing)

use crate::types::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for magnet-mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for magnet-mirror
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "upload.max_file_size")
        key: Option<String>,
    },

    /// Notification channel error
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Transfer-engine error
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Archiver error
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Upload pipeline error
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (7z, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// The run was interrupted by the user
    #[error("interrupted by user")]
    Interrupted,
}

/// Notification channel errors
///
/// These are only surfaced after channel-level retries are exhausted.
/// Callers log them and continue: a notification failure must never abort
/// the pipeline.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Send or edit failed after the bounded retry budget was spent
    #[error("chat API call failed after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// The chat API returned a 200 but the body could not be interpreted
    #[error("malformed chat API response: {reason}")]
    MalformedResponse {
        /// What was missing or unparseable
        reason: String,
    },
}

/// Transfer-engine errors (fatal for the transfer)
#[derive(Debug, Error)]
pub enum TransferError {
    /// The engine handle became invalid while waiting for metadata
    #[error("failed to fetch metadata for {name}: handle invalidated")]
    MetadataFailed {
        /// Display name of the transfer
        name: String,
    },

    /// The engine handle became invalid mid-download
    #[error("download handle for {name} became invalid")]
    HandleInvalidated {
        /// Display name of the transfer
        name: String,
    },

    /// The underlying engine reported a failure
    #[error("torrent engine failure: {reason}")]
    Engine {
        /// Engine-reported reason
        reason: String,
    },
}

/// Archiver errors
///
/// Skip conditions (no subdirectories, empty directory, ...) are not errors;
/// they are `ArchiveOutcome::Skipped`. These variants cover actual failures
/// of the external archiving tool, which the pipeline treats as non-fatal.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The 7z binary could not be found
    #[error("7z binary not found (set archive.sevenzip_path or install 7z)")]
    BinaryMissing,

    /// The archiving tool exited with a non-zero status
    #[error("7z exited with status {code:?}: {detail}")]
    ToolFailed {
        /// Process exit code, if any
        code: Option<i32>,
        /// Tail of the tool's error output
        detail: String,
    },
}

/// Upload pipeline errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// The file exceeds the configured size ceiling; no network call is made
    #[error("file size {size} bytes exceeds the {limit} byte upload ceiling")]
    TooLarge {
        /// Size of the file that was rejected
        size: u64,
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// The file to upload does not exist
    #[error("upload source {path} not found")]
    FileMissing {
        /// The missing path
        path: PathBuf,
    },

    /// A single provider rejected the upload (fall through to the next one)
    #[error("{provider} upload failed: {reason}")]
    Provider {
        /// Which provider failed
        provider: ProviderKind,
        /// Provider-reported or transport-level reason
        reason: String,
    },

    /// Every configured provider failed
    #[error("all {tried} configured providers failed")]
    AllProvidersFailed {
        /// Number of providers that were attempted
        tried: usize,
    },
}

impl Error {
    /// True for errors that abort the whole run rather than a single stage.
    ///
    /// Per the propagation policy, only transfer-engine fatal errors and
    /// user interrupts abort the pipeline; everything else degrades to a
    /// fallback path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Transfer(_) | Error::Interrupted)
    }
}
