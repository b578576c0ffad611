//! Progress rendering for file operations

use std::fmt;
use std::time::Duration;

use chunkseal_core::ProgressFn;
use indicatif::{ProgressBar, ProgressStyle};

/// Derived throughput figures for one progress tick.
///
/// Speed and ETA are `None` until some bytes have moved and time has passed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferStats {
    pub percent: f64,
    /// Decimal megabytes per second
    pub speed_mbps: Option<f64>,
    pub eta_secs: Option<f64>,
}

impl TransferStats {
    pub fn compute(processed: u64, total: u64, elapsed: Duration) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };

        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 || processed == 0 {
            return Self {
                percent,
                speed_mbps: None,
                eta_secs: None,
            };
        }

        let bytes_per_sec = processed as f64 / secs;
        Self {
            percent,
            speed_mbps: Some(bytes_per_sec / 1_000_000.0),
            eta_secs: Some(total.saturating_sub(processed) as f64 / bytes_per_sec),
        }
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.speed_mbps {
            Some(speed) => write!(f, "Speed: {speed:.2} MB/s")?,
            None => f.write_str("Speed: -- MB/s")?,
        }
        match self.eta_secs {
            Some(eta) => write!(f, " | ETA: {eta:.1}s"),
            None => f.write_str(" | ETA: --s"),
        }
    }
}

pub fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Bridge engine progress callbacks onto an indicatif bar.
pub fn bar_callback(pb: ProgressBar) -> ProgressFn {
    Box::new(move |done, total, started| {
        let stats = TransferStats::compute(done, total, started.elapsed());
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(stats.to_string());
    })
}

pub fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_midway() {
        let stats = TransferStats::compute(5_000_000, 20_000_000, Duration::from_secs(2));
        assert_eq!(stats.percent, 25.0);
        assert_eq!(stats.speed_mbps, Some(2.5));
        assert_eq!(stats.eta_secs, Some(6.0));
        assert_eq!(stats.to_string(), "Speed: 2.50 MB/s | ETA: 6.0s");
    }

    #[test]
    fn test_stats_guard_zero_elapsed() {
        let stats = TransferStats::compute(1000, 2000, Duration::ZERO);
        assert_eq!(stats.percent, 50.0);
        assert_eq!(stats.speed_mbps, None);
        assert_eq!(stats.to_string(), "Speed: -- MB/s | ETA: --s");
    }

    #[test]
    fn test_stats_guard_nothing_processed() {
        let stats = TransferStats::compute(0, 2000, Duration::from_secs(1));
        assert_eq!(stats.percent, 0.0);
        assert_eq!(stats.eta_secs, None);
    }

    #[test]
    fn test_stats_empty_total() {
        let stats = TransferStats::compute(0, 0, Duration::from_secs(1));
        assert_eq!(stats.percent, 100.0);
    }

    #[test]
    fn test_stats_complete() {
        let stats = TransferStats::compute(4_000_000, 4_000_000, Duration::from_secs(4));
        assert_eq!(stats.percent, 100.0);
        assert_eq!(stats.eta_secs, Some(0.0));
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
