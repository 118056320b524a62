//! Per-file job records and the partial-update merge.

use mp_core::InputFile;
use serde::{Deserialize, Serialize};

/// Status text of a file that has not started yet.
pub const PREPARING: &str = "Preparing";

/// Coarse lifecycle derived from a [`FileJobRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Error,
}

/// Observable state of one file within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileJobRecord {
    /// Original input file name.
    pub filename: String,
    /// `0..=100`
    pub progress_percent: u8,
    /// Human-readable phase, or `Error: <message>`.
    pub status_text: String,
    pub is_complete: bool,
    pub has_error: bool,
    /// Input size in bytes.
    pub size_before: u64,
    /// Output video size in bytes, once produced.
    pub size_after: Option<u64>,
}

impl FileJobRecord {
    /// Fresh record for a file that is about to be queued.
    pub fn pending(file: &InputFile) -> Self {
        Self {
            filename: file.name.clone(),
            progress_percent: 0,
            status_text: PREPARING.to_string(),
            is_complete: false,
            has_error: false,
            size_before: file.size,
            size_after: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        if self.has_error {
            JobStatus::Error
        } else if self.is_complete {
            JobStatus::Complete
        } else if self.progress_percent > 0 || self.status_text != PREPARING {
            JobStatus::Running
        } else {
            JobStatus::Pending
        }
    }

    /// Whether the record can no longer change within its batch.
    pub fn is_settled(&self) -> bool {
        self.is_complete || self.has_error
    }
}

/// A partial update to one [`FileJobRecord`]. Fields left as `None` keep
/// their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress_percent: Option<u8>,
    pub status_text: Option<String>,
    pub is_complete: Option<bool>,
    pub has_error: Option<bool>,
    pub size_before: Option<u64>,
    pub size_after: Option<u64>,
}

impl ProgressUpdate {
    /// Move to a new phase.
    pub fn phase(percent: u8, status: impl Into<String>) -> Self {
        Self {
            progress_percent: Some(percent),
            status_text: Some(status.into()),
            ..Self::default()
        }
    }

    /// Successful completion with the produced video size.
    pub fn complete(status: impl Into<String>, size_after: u64) -> Self {
        Self {
            progress_percent: Some(100),
            status_text: Some(status.into()),
            is_complete: Some(true),
            has_error: Some(false),
            size_after: Some(size_after),
            ..Self::default()
        }
    }

    /// Failure: progress drops to zero and the message is shown.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self {
            progress_percent: Some(0),
            status_text: Some(format!("Error: {message}")),
            is_complete: Some(false),
            has_error: Some(true),
            ..Self::default()
        }
    }

    pub fn with_size_before(mut self, size: u64) -> Self {
        self.size_before = Some(size);
        self
    }
}

/// Apply `update` on top of `old`, returning the new record.
///
/// Progress is clamped to 100.
pub fn merge_update(old: &FileJobRecord, update: &ProgressUpdate) -> FileJobRecord {
    FileJobRecord {
        filename: old.filename.clone(),
        progress_percent: update
            .progress_percent
            .map(|p| p.min(100))
            .unwrap_or(old.progress_percent),
        status_text: update
            .status_text
            .clone()
            .unwrap_or_else(|| old.status_text.clone()),
        is_complete: update.is_complete.unwrap_or(old.is_complete),
        has_error: update.has_error.unwrap_or(old.has_error),
        size_before: update.size_before.unwrap_or(old.size_before),
        size_after: update.size_after.or(old.size_after),
    }
}
