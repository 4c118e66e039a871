//! Status message rendering
//!
//! All chat-facing text blocks live here so every stage reports in the same
//! visual style: a fixed-width block progress bar between decorative rails,
//! followed by speed / ETA / size lines.

use crate::types::{ProviderKind, TransferSnapshot};
use crate::utils::{format_elapsed, format_eta, format_rate, format_size, progress_bar};
use std::time::Duration;

/// Decorative rail above and below the progress bar
const RAIL: &str = "▰▰▰▰▰▰▰▰▰▰▰▰▰▰▰▰▰▰▰▰";

/// Initial message, before metadata is available
pub fn starting(name: &str) -> String {
    format!("📥 Starting: {name}\nStatus: Waiting for metadata...")
}

/// Per-tick download progress block
pub fn downloading(name: &str, snapshot: &TransferSnapshot) -> String {
    let eta = match snapshot.eta() {
        Some(eta) => format_eta(eta),
        None => "calculating...".to_string(),
    };
    format!(
        "📥 Downloading: {name}\n\n\
         {RAIL}\n\
         {} {:.1}%\n\
         {RAIL}\n\n\
         ⬇️ Speed: {}\n\
         ⬆️ Upload: {}\n\
         👥 Peers: {}\n\
         ⏳ ETA: {eta}\n\
         💾 Size: {}\n\
         📊 Status: {}",
        progress_bar(snapshot.progress),
        snapshot.progress,
        format_rate(snapshot.download_rate),
        format_rate(snapshot.upload_rate),
        snapshot.peers,
        format_size(snapshot.total_bytes),
        snapshot.state,
    )
}

/// Terminal download failure
pub fn download_failed(reason: &str) -> String {
    format!("❌ Download failed: {reason}")
}

/// Archive stage is about to start
pub fn compress_preparing() -> String {
    "✅ Download Complete!\n🗜️ Preparing compression...".to_string()
}

/// Streaming archive progress block
pub fn compress_progress(
    current_file: &str,
    percentage: f64,
    speed: f64,
    avg_speed: f64,
    processed_bytes: u64,
    total_bytes: u64,
) -> String {
    format!(
        "✅ Download Complete!\n\
         🗜️ Compressing Directories:\n\n\
         📁 Current: {current_file}\n\
         {RAIL}\n\
         {} {percentage:.1}%\n\
         {RAIL}\n\n\
         ⚡ Speed: {}\n\
         📊 Avg Speed: {}\n\
         💾 Size: {} / {}",
        progress_bar(percentage),
        format_rate(speed),
        format_rate(avg_speed),
        format_size(processed_bytes),
        format_size(total_bytes),
    )
}

/// Archive stage was skipped; upload proceeds on the original content
pub fn compress_skipped(reason: &str) -> String {
    format!("✅ Download Complete!\n📝 {reason}\n📤 Preparing upload...")
}

/// Archive tool failed; upload degrades to the original content
pub fn compress_failed(reason: &str) -> String {
    format!("✅ Download Complete!\n❌ Compression failed: {reason}\n📤 Uploading original files...")
}

fn compression_line(was_compressed: bool) -> &'static str {
    if was_compressed {
        "✅ Compression Complete!"
    } else {
        "📝 No compression needed"
    }
}

/// Upload started against a provider
pub fn uploading(provider: ProviderKind, was_compressed: bool) -> String {
    format!(
        "✅ Download Complete!\n{}\n📤 Uploading file to {provider}...",
        compression_line(was_compressed)
    )
}

/// Terminal success message with the obtained link
#[allow(clippy::too_many_arguments)]
pub fn final_success(
    file_name: &str,
    link: &str,
    size: u64,
    provider: ProviderKind,
    was_compressed: bool,
    download_elapsed: Duration,
    upload_elapsed: Duration,
) -> String {
    format!(
        "✅ Download Complete!\n\
         {}\n\
         ✅ Upload Complete!\n\n\
         📁 File: {file_name}\n\
         🔗 Download Link: {link}\n\
         💾 Size: {}\n\
         🌐 Host: {provider}\n\
         ⏱ Downloaded in {}, uploaded in {}",
        compression_line(was_compressed),
        format_size(size),
        format_elapsed(download_elapsed),
        format_elapsed(upload_elapsed),
    )
}

/// Terminal failure message for the upload stage (rejection or exhaustion)
pub fn upload_failed(reason: &str, was_compressed: bool) -> String {
    format!(
        "✅ Download Complete!\n{}\n❌ Upload Failed!\n\nError Details: {reason}",
        compression_line(was_compressed)
    )
}

/// Terminal message when the download produced nothing to upload
pub fn nothing_to_upload() -> String {
    "✅ Download Complete!\n❌ No files to upload".to_string()
}

/// Terminal message for a user interrupt
pub fn interrupted() -> String {
    "⚠️ User interrupted".to_string()
}

/// Terminal message for an unexpected error
pub fn run_error(reason: &str) -> String {
    format!("❌ Error: {reason}")
}
