//! Directory archiving via the external 7z tool
//!
//! The archiver folds the subdirectories of a completed download into a
//! single `.7z` so multi-directory payloads can be uploaded as one file.
//! Loose files at the download root are left alone. Skips are ordinary
//! outcomes ([`ArchiveOutcome::Skipped`]); only a missing binary or a
//! failing tool run is an error.

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Error, Result};
use crate::notify::ProgressReporter;
use crate::render;
use crate::types::{ArchiveOutcome, SkipReason};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[allow(clippy::expect_used)]
fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)%").expect("static regex"))
}

#[allow(clippy::expect_used)]
fn current_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s-\s(.+)$").expect("static regex"))
}

/// What the pre-archive scan found under the download root
struct Scan {
    subdirs: Vec<PathBuf>,
    has_loose_files: bool,
    /// Total bytes under the subdirectories, for progress math
    subdir_bytes: u64,
}

/// Compresses download subdirectories with 7z, streaming progress
pub struct Archiver<'a> {
    config: &'a ArchiveConfig,
    reporter: &'a ProgressReporter,
    cancel: &'a CancellationToken,
}

impl<'a> Archiver<'a> {
    /// Create an archiver borrowing the config and reporter
    pub fn new(
        config: &'a ArchiveConfig,
        reporter: &'a ProgressReporter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            reporter,
            cancel,
        }
    }

    /// Archive the subdirectories of `root` into `{base_name}.7z`.
    ///
    /// Skip conditions, checked in order:
    /// - archiving disabled by configuration
    /// - `root` is not a directory
    /// - `root` is empty
    /// - `root` has no subdirectories (loose files only)
    /// - the subdirectories hold no files
    pub async fn archive(&self, root: &Path, base_name: &str) -> Result<ArchiveOutcome> {
        if !self.config.enabled {
            return Ok(skipped(SkipReason::Disabled));
        }
        if !root.is_dir() {
            return Ok(skipped(SkipReason::NotADirectory));
        }

        let scan = scan_root(root)?;
        if scan.subdirs.is_empty() {
            let reason = if scan.has_loose_files {
                SkipReason::NoSubdirectories
            } else {
                SkipReason::EmptyRoot
            };
            return Ok(skipped(reason));
        }
        if scan.subdir_bytes == 0 {
            return Ok(skipped(SkipReason::NoFilesInSubdirectories));
        }

        let binary = self.locate_binary()?;
        let output = root.join(format!("{}.7z", sanitize_file_name(base_name)));
        tracing::info!(
            output = %output.display(),
            subdirs = scan.subdirs.len(),
            total_bytes = scan.subdir_bytes,
            level = self.config.level,
            "compressing subdirectories"
        );
        self.reporter.publish(render::compress_preparing());

        self.run_sevenzip(&binary, &output, &scan).await?;

        Ok(ArchiveOutcome::Archived(output))
    }

    /// Resolve the 7z executable from config or PATH
    fn locate_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.sevenzip_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(ArchiveError::BinaryMissing.into());
        }
        if self.config.search_path {
            if let Ok(found) = which::which("7z") {
                return Ok(found);
            }
        }
        Err(ArchiveError::BinaryMissing.into())
    }

    async fn run_sevenzip(&self, binary: &Path, output: &Path, scan: &Scan) -> Result<()> {
        // -bsp1 routes the progress indicator to stdout so it can be
        // streamed; -aoa overwrites a stale archive from a previous run.
        let mut child = Command::new(binary)
            .arg("a")
            .arg("-t7z")
            .arg("-m0=lzma2")
            .arg(format!("-mx={}", self.config.level))
            .arg("-mmt=on")
            .arg("-aoa")
            .arg("-bsp1")
            .arg(output)
            .args(&scan.subdirs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to spawn 7z: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("7z stdout not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("7z stderr not captured".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut detail = String::new();
            let _ = stderr.read_to_string(&mut detail).await;
            detail
        });

        let mut tracker =
            ProgressTracker::new(scan.subdir_bytes, self.config.speed_window);
        let mut reader = stdout;
        let mut chunk = [0u8; 4096];
        let mut line = Vec::new();

        loop {
            let n = tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = child.kill().await;
                    stderr_task.abort();
                    return Err(Error::Interrupted);
                }
                read = reader.read(&mut chunk) => {
                    read.map_err(|e| Error::ExternalTool(format!("reading 7z output: {e}")))?
                }
            };
            if n == 0 {
                break;
            }
            // 7z rewrites the progress line with carriage returns, so both
            // \r and \n terminate a line.
            for &byte in &chunk[..n] {
                if byte == b'\r' || byte == b'\n' {
                    if !line.is_empty() {
                        let text = String::from_utf8_lossy(&line).into_owned();
                        if let Some(rendered) = tracker.observe(&text) {
                            self.reporter.publish(rendered);
                        }
                        line.clear();
                    }
                } else {
                    line.push(byte);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::ExternalTool(format!("waiting for 7z: {e}")))?;
        let detail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(ArchiveError::ToolFailed {
                code: status.code(),
                detail: detail.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn skipped(reason: SkipReason) -> ArchiveOutcome {
    tracing::info!(%reason, "archive stage skipped");
    ArchiveOutcome::Skipped { reason }
}

/// Replace path separators so the archive lands inside the root
fn sanitize_file_name(name: &str) -> String {
    name.replace(['/', '\\', '\0'], "_")
}

fn scan_root(root: &Path) -> Result<Scan> {
    let mut subdirs = Vec::new();
    let mut has_loose_files = false;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else {
            has_loose_files = true;
        }
    }
    subdirs.sort();

    let mut subdir_bytes = 0u64;
    for dir in &subdirs {
        subdir_bytes += dir_size(dir)?;
    }

    Ok(Scan {
        subdirs,
        has_loose_files,
        subdir_bytes,
    })
}

/// Total size of all files under a directory, iteratively
fn dir_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata()?.len();
            }
        }
    }
    Ok(total)
}

/// Parses 7z `-bsp1` output lines into rendered progress blocks.
///
/// A progress line looks like `" 42% 118 - Show/episode.mkv"`. Percentage
/// and current file are extracted independently since either can appear
/// alone. Speed is derived from the byte delta between samples, with a
/// rolling window smoothing the average.
struct ProgressTracker {
    total_bytes: u64,
    current_file: String,
    last_percentage: f64,
    last_bytes: u64,
    last_sample: Instant,
    speeds: VecDeque<f64>,
    window: usize,
}

impl ProgressTracker {
    fn new(total_bytes: u64, window: usize) -> Self {
        Self {
            total_bytes,
            current_file: String::new(),
            last_percentage: -1.0,
            last_bytes: 0,
            last_sample: Instant::now(),
            speeds: VecDeque::new(),
            window: window.max(1),
        }
    }

    /// Feed one output line; returns rendered text when anything changed
    fn observe(&mut self, line: &str) -> Option<String> {
        let mut changed = false;

        if let Some(caps) = current_file_re().captures(line) {
            let file = caps[1].trim().to_string();
            if !file.is_empty() && file != self.current_file {
                self.current_file = file;
                changed = true;
            }
        }

        if let Some(caps) = percent_re().captures(line) {
            if let Ok(pct) = caps[1].parse::<f64>() {
                if (pct - self.last_percentage).abs() > f64::EPSILON {
                    self.sample(pct);
                    self.last_percentage = pct;
                    changed = true;
                }
            }
        }

        if !changed || self.last_percentage < 0.0 {
            return None;
        }

        let processed = self.processed_bytes();
        Some(render::compress_progress(
            &self.current_file,
            self.last_percentage,
            self.speeds.back().copied().unwrap_or(0.0),
            self.average_speed(),
            processed,
            self.total_bytes,
        ))
    }

    fn sample(&mut self, pct: f64) {
        let now = Instant::now();
        let processed = (pct / 100.0 * self.total_bytes as f64) as u64;
        let dt = now.duration_since(self.last_sample).as_secs_f64();
        if dt > 0.0 && processed > self.last_bytes {
            let speed = (processed - self.last_bytes) as f64 / dt;
            self.speeds.push_back(speed);
            while self.speeds.len() > self.window {
                self.speeds.pop_front();
            }
        }
        self.last_bytes = processed;
        self.last_sample = now;
    }

    fn processed_bytes(&self) -> u64 {
        (self.last_percentage.max(0.0) / 100.0 * self.total_bytes as f64) as u64
    }

    fn average_speed(&self) -> f64 {
        if self.speeds.is_empty() {
            return 0.0;
        }
        self.speeds.iter().sum::<f64>() / self.speeds.len() as f64
    }
}
