//! Formatting helpers for rendered status text

use std::time::Duration;

/// Width of the block-character progress bar in rendered messages
pub const PROGRESS_BAR_WIDTH: usize = 25;

/// Render a fixed-width block-character progress bar for a percentage in `[0, 100]`.
///
/// # Examples
///
/// ```
/// use magnet_mirror::utils::progress_bar;
///
/// assert_eq!(progress_bar(0.0), "░".repeat(25));
/// assert_eq!(progress_bar(100.0), "█".repeat(25));
/// ```
pub fn progress_bar(percentage: f64) -> String {
    let clamped = percentage.clamp(0.0, 100.0);
    let filled = ((PROGRESS_BAR_WIDTH as f64) * clamped / 100.0) as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(PROGRESS_BAR_WIDTH - filled));
    bar
}

/// Format a byte count as a human-readable size (B, KB, MB, GB, TB)
pub fn format_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

/// Format a byte-per-second rate in MB/s
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{:.2} MB/s", bytes_per_sec / 1_048_576.0)
}

/// Format a duration as `XhYmZs`
pub fn format_eta(eta: Duration) -> String {
    let total = eta.as_secs();
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}

/// Format an elapsed duration in whole seconds with two decimals
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_is_always_full_width() {
        for pct in [0.0, 1.0, 33.3, 50.0, 99.9, 100.0] {
            let bar = progress_bar(pct);
            assert_eq!(
                bar.chars().count(),
                PROGRESS_BAR_WIDTH,
                "bar for {pct}% has wrong width"
            );
        }
    }

    #[test]
    fn progress_bar_fill_tracks_percentage() {
        let half = progress_bar(50.0);
        assert_eq!(half.chars().filter(|c| *c == '█').count(), 12);
        assert_eq!(half.chars().filter(|c| *c == '░').count(), 13);
    }

    #[test]
    fn progress_bar_clamps_out_of_range_input() {
        assert_eq!(progress_bar(-5.0), "░".repeat(PROGRESS_BAR_WIDTH));
        assert_eq!(progress_bar(150.0), "█".repeat(PROGRESS_BAR_WIDTH));
    }

    #[test]
    fn sizes_pick_the_right_unit() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024 * 1024), "2.00 TB");
    }

    #[test]
    fn eta_renders_hours_minutes_seconds() {
        assert_eq!(format_eta(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_eta(Duration::from_secs(59)), "0h 0m 59s");
        assert_eq!(format_eta(Duration::from_secs(7200)), "2h 0m 0s");
    }

    #[test]
    fn rate_is_rendered_in_megabytes() {
        assert_eq!(format_rate(1_048_576.0), "1.00 MB/s");
        assert_eq!(format_rate(0.0), "0.00 MB/s");
    }
}
