//! Console rendering of batch progress and results.

use std::collections::HashMap;

use mp_batch::{FileJobRecord, JobStatus, ProgressSink};
use mp_core::BatchId;
use parking_lot::Mutex;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes as megabytes with two decimals, e.g. `12.34 MB`.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// `before -> after (difference MB, difference %)`. Negative numbers mean
/// the file got smaller.
pub fn size_change(before: u64, after: u64) -> String {
    let diff = after as f64 - before as f64;
    let percent = if before == 0 {
        0.0
    } else {
        diff / before as f64 * 100.0
    };
    format!(
        "{} -> {} ({:+.2} MB, {:+.2}%)",
        format_mb(before),
        format_mb(after),
        diff / BYTES_PER_MB,
        percent
    )
}

/// One summary line per file for the end of a batch.
pub fn summary_line(record: &FileJobRecord) -> String {
    match (record.status(), record.size_after) {
        (JobStatus::Complete, Some(after)) => format!(
            "✓ {}: {}",
            record.filename,
            size_change(record.size_before, after)
        ),
        (JobStatus::Error, _) => format!("✗ {}: {}", record.filename, record.status_text),
        _ => format!(
            "- {}: {} ({}%)",
            record.filename, record.status_text, record.progress_percent
        ),
    }
}

/// Prints progress lines to stderr.
///
/// A line is printed when a file changes phase or crosses a 10% step, so
/// fine-grained engine progress does not flood the terminal.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    last: Mutex<HashMap<usize, (u8, String)>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `record` differs enough from what was last printed for
    /// `index`.
    fn should_print(&self, index: usize, record: &FileJobRecord) -> bool {
        let bucket = record.progress_percent / 10;
        let mut last = self.last.lock();
        let changed = match last.get(&index) {
            Some((b, status)) => *b != bucket || *status != record.status_text,
            None => true,
        };
        if changed {
            last.insert(index, (bucket, record.status_text.clone()));
        }
        changed
    }
}

impl ProgressSink for ConsoleSink {
    fn batch_started(&self, _batch_id: BatchId, records: &[FileJobRecord]) {
        self.last.lock().clear();
        eprintln!("Queued {} file(s)", records.len());
    }

    fn file_updated(&self, _batch_id: BatchId, index: usize, record: &FileJobRecord) {
        if self.should_print(index, record) {
            eprintln!(
                "  [{:>3}%] {}: {}",
                record.progress_percent, record.filename, record.status_text
            );
        }
    }

    fn status_changed(&self, _batch_id: Option<BatchId>, text: &str) {
        eprintln!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(progress: u8, status: &str) -> FileJobRecord {
        FileJobRecord {
            filename: "clip.mp4".into(),
            progress_percent: progress,
            status_text: status.into(),
            is_complete: false,
            has_error: false,
            size_before: 10 * 1024 * 1024,
            size_after: None,
        }
    }

    #[test]
    fn formats_megabytes() {
        assert_eq!(format_mb(0), "0.00 MB");
        assert_eq!(format_mb(1024 * 1024), "1.00 MB");
        assert_eq!(format_mb(1536 * 1024), "1.50 MB");
    }

    #[test]
    fn size_change_shows_reduction() {
        assert_eq!(
            size_change(10 * 1024 * 1024, 4 * 1024 * 1024),
            "10.00 MB -> 4.00 MB (-6.00 MB, -60.00%)"
        );
        assert_eq!(
            size_change(1024 * 1024, 2 * 1024 * 1024),
            "1.00 MB -> 2.00 MB (+1.00 MB, +100.00%)"
        );
        assert_eq!(size_change(0, 0), "0.00 MB -> 0.00 MB (+0.00 MB, +0.00%)");
    }

    #[test]
    fn summary_lines_by_status() {
        let mut done = record(100, "Complete");
        done.is_complete = true;
        done.size_after = Some(5 * 1024 * 1024);
        assert_eq!(
            summary_line(&done),
            "✓ clip.mp4: 10.00 MB -> 5.00 MB (-5.00 MB, -50.00%)"
        );

        let mut failed = record(0, "Error: boom");
        failed.has_error = true;
        assert_eq!(summary_line(&failed), "✗ clip.mp4: Error: boom");

        assert_eq!(summary_line(&record(0, "Preparing")), "- clip.mp4: Preparing (0%)");
    }

    #[test]
    fn console_sink_throttles_ratio_updates() {
        let sink = ConsoleSink::new();
        assert!(sink.should_print(0, &record(2, "Starting compression")));
        assert!(sink.should_print(0, &record(3, "Compressing")));
        assert!(!sink.should_print(0, &record(7, "Compressing")));
        assert!(sink.should_print(0, &record(12, "Compressing")));
        assert!(sink.should_print(1, &record(12, "Compressing")));
    }
}
