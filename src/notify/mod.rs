//! Chat notification: HTTP channel plus throttled progress reporting

/// HTTP channel implementing the chat-bot contract
pub mod channel;
/// Deduplicating, throttled status reporter
pub mod reporter;

pub use channel::{MessageHandle, NotificationChannel};
pub use reporter::ProgressReporter;
