//! Torrent transfer engine
//!
//! The BitTorrent protocol itself is an external capability, consumed
//! through the [`TorrentSession`] / [`TorrentHandle`] traits. This module
//! owns everything around that capability: session settings, the
//! metadata/download polling state machine, progress rendering, and
//! cancellation.

/// Magnet URI helpers
pub mod magnet;

use crate::config::TransferConfig;
use crate::error::{Error, Result, TransferError};
use crate::notify::ProgressReporter;
use crate::render;
use crate::types::{CompletedTransfer, TransferSnapshot, TransferState};
use async_trait::async_trait;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Engine session settings applied when a transfer is added
///
/// Mirrors the tuning the pipeline has always used: sparse on-disk
/// allocation, unlimited transfer/seed concurrency, all discovery
/// mechanisms on, and short fixed network timeouts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Inclusive listen port range
    pub listen_ports: (u16, u16),
    /// Allocate payload files sparsely on disk
    pub sparse_allocation: bool,
    /// No cap on simultaneously active transfers or seeds
    pub unlimited_active: bool,
    /// Enable the distributed hash table
    pub enable_dht: bool,
    /// Enable local service discovery
    pub enable_local_discovery: bool,
    /// Enable NAT traversal (UPnP and NAT-PMP)
    pub enable_nat_traversal: bool,
    /// Timeout for establishing a peer connection
    pub peer_connect_timeout: Duration,
    /// Timeout for an outstanding piece request
    pub request_timeout: Duration,
}

impl SessionSettings {
    /// Build settings from the transfer configuration
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            listen_ports: config.listen_ports,
            sparse_allocation: true,
            unlimited_active: true,
            enable_dht: true,
            enable_local_discovery: true,
            enable_nat_traversal: true,
            peer_connect_timeout: config.peer_connect_timeout,
            request_timeout: config.request_timeout,
        }
    }
}

/// Handle to a single in-flight transfer
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    /// Whether the engine still considers this handle usable
    async fn is_valid(&self) -> bool;

    /// Whether torrent metadata has been fetched from the swarm
    async fn has_metadata(&self) -> bool;

    /// Sample the current transfer status
    async fn status(&self) -> TransferSnapshot;
}

/// External torrent-engine capability
///
/// Implementations wrap a concrete BitTorrent engine. The pipeline only
/// needs to add a magnet, poll its handle, and tear the session down.
#[async_trait]
pub trait TorrentSession: Send + Sync {
    /// Handle type produced by [`add_magnet`](TorrentSession::add_magnet)
    type Handle: TorrentHandle;

    /// Add a magnet transfer to the session
    async fn add_magnet(
        &self,
        magnet: &str,
        save_path: &Path,
        settings: &SessionSettings,
    ) -> Result<Self::Handle>;

    /// Pause active transfers and remove in-flight torrent state.
    ///
    /// Called on every pipeline exit path, including error and interrupt.
    async fn shutdown(&self) -> Result<()>;
}

/// Drives a torrent download to completion, reporting progress
pub struct TransferEngine<'a, S: TorrentSession> {
    session: &'a S,
    config: &'a TransferConfig,
    reporter: &'a ProgressReporter,
    cancel: &'a CancellationToken,
}

impl<'a, S: TorrentSession> TransferEngine<'a, S> {
    /// Create an engine borrowing the session, config, and reporter
    pub fn new(
        session: &'a S,
        config: &'a TransferConfig,
        reporter: &'a ProgressReporter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            session,
            config,
            reporter,
            cancel,
        }
    }

    /// Download a magnet transfer to the configured save path.
    ///
    /// State machine: Pending → FetchingMetadata → Downloading → Seeding.
    /// Handle validity is rechecked every iteration; an invalidated handle
    /// is fatal for the transfer. Progress is pushed through the reporter
    /// on every tick - the reporter throttles outward delivery, the poll
    /// loop itself stays tight.
    pub async fn download(&self, magnet: &str) -> Result<CompletedTransfer> {
        let name = magnet::extract_display_name(magnet);
        tracing::info!(name = %name, save_path = %self.config.save_path.display(), "starting transfer");

        let settings = SessionSettings::from_config(self.config);
        let handle = self
            .session
            .add_magnet(magnet, &self.config.save_path, &settings)
            .await?;

        self.reporter.publish(render::starting(&name));
        self.wait_for_metadata(&handle, &name).await?;

        tracing::info!(name = %name, "metadata fetched, downloading payload");
        let started = Instant::now();

        loop {
            self.tick(self.config.poll_interval).await?;

            if !handle.is_valid().await {
                return Err(TransferError::HandleInvalidated { name }.into());
            }

            let snapshot = handle.status().await;
            match snapshot.state {
                TransferState::Seeding => break,
                TransferState::Failed => {
                    return Err(TransferError::Engine {
                        reason: format!("engine reported failure for {name}"),
                    }
                    .into());
                }
                _ => {}
            }

            self.reporter.publish(render::downloading(&name, &snapshot));
        }

        let elapsed = started.elapsed();
        tracing::info!(
            name = %name,
            elapsed_secs = elapsed.as_secs_f64(),
            "download complete, transfer is seeding"
        );

        Ok(CompletedTransfer {
            name,
            save_path: self.config.save_path.clone(),
            elapsed,
        })
    }

    async fn wait_for_metadata(&self, handle: &S::Handle, name: &str) -> Result<()> {
        loop {
            if handle.has_metadata().await {
                return Ok(());
            }
            if !handle.is_valid().await {
                return Err(TransferError::MetadataFailed {
                    name: name.to_string(),
                }
                .into());
            }
            self.tick(self.config.metadata_poll_interval).await?;
        }
    }

    /// Sleep one poll interval, bailing out promptly on cancellation
    async fn tick(&self, interval: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Interrupted),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }
}
