//! Configuration types for magnet-mirror
//!
//! All settings are explicit constructor inputs; the library reads no
//! environment variables and keeps no ambient globals. Credentials, chat
//! destination, and path overrides are resolved by the embedding
//! application and handed in as a pre-built [`Config`].

use crate::error::{Error, Result};
use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Chat notification settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Bot token for the chat API
    pub bot_token: String,

    /// Destination chat id
    pub chat_id: String,

    /// Base URL of the chat API (default: "https://api.telegram.org")
    ///
    /// Overridable so tests can point the channel at a local mock server.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Minimum wall-clock interval between successive message edits (default: 3s)
    #[serde(default = "default_min_edit_interval")]
    pub min_edit_interval: Duration,

    /// Bounded retry count for a failed send (default: 3)
    ///
    /// Rate-limit (429) retries are server-directed and unbounded; this
    /// budget only covers other failures.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,

    /// Bounded retry count for a failed edit (default: 5)
    #[serde(default = "default_edit_retries")]
    pub edit_retries: u32,

    /// Fixed backoff between non-429 retries (default: 5s)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Per-request HTTP timeout (default: 10s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_api_base(),
            min_edit_interval: default_min_edit_interval(),
            send_retries: default_send_retries(),
            edit_retries: default_edit_retries(),
            retry_delay: default_retry_delay(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Torrent transfer settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory the payload is downloaded into (default: "./downloads")
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,

    /// Poll interval while waiting for metadata (default: 1s)
    #[serde(default = "default_metadata_poll_interval")]
    pub metadata_poll_interval: Duration,

    /// Poll interval during the download phase (default: 250ms)
    ///
    /// Kept tight on purpose: outward notification is throttled by the
    /// reporter, never by this loop.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Engine timeout for connecting to a peer (default: 2s)
    #[serde(default = "default_peer_connect_timeout")]
    pub peer_connect_timeout: Duration,

    /// Engine timeout for an outstanding piece request (default: 10s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Inclusive listen port range for the engine session (default: 6881-6891)
    #[serde(default = "default_listen_ports")]
    pub listen_ports: (u16, u16),
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            metadata_poll_interval: default_metadata_poll_interval(),
            poll_interval: default_poll_interval(),
            peer_connect_timeout: default_peer_connect_timeout(),
            request_timeout: default_request_timeout(),
            listen_ports: default_listen_ports(),
        }
    }
}

/// Archive stage settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Whether the archive stage runs at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the 7z executable (auto-detected if None)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,

    /// Whether to search PATH for 7z if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// 7z compression level, 0-9 (default: 0 = store)
    ///
    /// Torrent payloads are usually already-compressed media, so the default
    /// stores without compressing to save CPU. Source variants disagreed on
    /// this; it is policy, not inference.
    #[serde(default)]
    pub level: u32,

    /// Number of samples in the rolling speed average (default: 5)
    #[serde(default = "default_speed_window")]
    pub speed_window: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sevenzip_path: None,
            search_path: true,
            level: 0,
            speed_window: default_speed_window(),
        }
    }
}

/// Upload stage settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Providers in fallback-chain priority order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,

    /// Hard size ceiling in bytes; larger files are rejected without any
    /// network call (default: 10 GiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Attempts per provider before falling through to the next one (default: 3)
    #[serde(default = "default_attempts_per_provider")]
    pub attempts_per_provider: u32,

    /// Base delay for the linearly increasing backoff between per-provider
    /// attempts (default: 5s; attempt N waits N * base)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Base URL for gofile.io uploads
    #[serde(default = "default_gofile_base")]
    pub gofile_base: String,

    /// Base URL for buzzheavier.com uploads
    #[serde(default = "default_buzzheavier_base")]
    pub buzzheavier_base: String,

    /// Base URL for pixeldrain.com uploads
    #[serde(default = "default_pixeldrain_base")]
    pub pixeldrain_base: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            max_file_size: default_max_file_size(),
            attempts_per_provider: default_attempts_per_provider(),
            retry_delay: default_retry_delay(),
            gofile_base: default_gofile_base(),
            buzzheavier_base: default_buzzheavier_base(),
            pixeldrain_base: default_pixeldrain_base(),
        }
    }
}

/// Main configuration for the mirror pipeline
///
/// Fields are organized into logical sub-configs:
/// - [`notify`](NotifyConfig) - chat API credentials and throttling
/// - [`transfer`](TransferConfig) - torrent engine and poll cadence
/// - [`archive`](ArchiveConfig) - 7z policy
/// - [`upload`](UploadConfig) - provider chain and size ceiling
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Torrent transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Archive stage settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Upload stage settings
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Validate the configuration, returning the offending key on error
    pub fn validate(&self) -> Result<()> {
        if self.notify.bot_token.is_empty() {
            return Err(Error::Config {
                message: "bot token must not be empty".into(),
                key: Some("notify.bot_token".into()),
            });
        }
        if self.notify.chat_id.is_empty() {
            return Err(Error::Config {
                message: "chat id must not be empty".into(),
                key: Some("notify.chat_id".into()),
            });
        }
        if self.upload.providers.is_empty() {
            return Err(Error::Config {
                message: "at least one upload provider is required".into(),
                key: Some("upload.providers".into()),
            });
        }
        if self.upload.max_file_size == 0 {
            return Err(Error::Config {
                message: "upload size ceiling must be non-zero".into(),
                key: Some("upload.max_file_size".into()),
            });
        }
        if self.archive.level > 9 {
            return Err(Error::Config {
                message: format!("7z level must be 0-9, got {}", self.archive.level),
                key: Some("archive.level".into()),
            });
        }
        if self.transfer.listen_ports.0 > self.transfer.listen_ports.1 {
            return Err(Error::Config {
                message: "listen port range is inverted".into(),
                key: Some("transfer.listen_ports".into()),
            });
        }
        Ok(())
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_min_edit_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_send_retries() -> u32 {
    3
}

fn default_edit_retries() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_save_path() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_metadata_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_peer_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_listen_ports() -> (u16, u16) {
    (6881, 6891)
}

fn default_speed_window() -> usize {
    5
}

fn default_providers() -> Vec<ProviderKind> {
    vec![
        ProviderKind::GoFile,
        ProviderKind::BuzzHeavier,
        ProviderKind::PixelDrain,
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 * 1024
}

fn default_attempts_per_provider() -> u32 {
    3
}

fn default_gofile_base() -> String {
    "https://store1.gofile.io".to_string()
}

fn default_buzzheavier_base() -> String {
    "https://w.buzzheavier.com".to_string()
}

fn default_pixeldrain_base() -> String {
    "https://pixeldrain.com".to_string()
}

fn default_true() -> bool {
    true
}
