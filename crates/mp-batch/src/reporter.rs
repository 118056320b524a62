//! Progress reporting.
//!
//! The [`Reporter`] owns the authoritative [`BatchState`] and forwards every
//! accepted change to a [`ProgressSink`]. Updates addressed to a batch that
//! has since been replaced are dropped, so a superseded run can never write
//! into the records of its successor.

use std::sync::Arc;

use mp_core::events::{EventBus, EventPayload};
use mp_core::{BatchId, InputFile, ProcessedOutput};
use mp_engine::RatioCallback;
use parking_lot::RwLock;

use crate::record::{FileJobRecord, ProgressUpdate};
use crate::state::BatchState;

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receives accepted state changes. All methods default to doing nothing.
///
/// Called synchronously from the orchestrator and from engine progress
/// callbacks, so implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn batch_started(&self, _batch_id: BatchId, _records: &[FileJobRecord]) {}

    fn file_updated(&self, _batch_id: BatchId, _index: usize, _record: &FileJobRecord) {}

    fn status_changed(&self, _batch_id: Option<BatchId>, _text: &str) {}

    fn batch_completed(&self, _batch_id: BatchId, _succeeded: usize, _failed: usize) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {}

/// Publishes every change on an [`EventBus`].
#[derive(Debug, Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
}

impl EventSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl ProgressSink for EventSink {
    fn batch_started(&self, batch_id: BatchId, records: &[FileJobRecord]) {
        self.bus.broadcast(EventPayload::BatchStarted {
            batch_id,
            files: records.iter().map(|r| r.filename.clone()).collect(),
        });
    }

    fn file_updated(&self, batch_id: BatchId, index: usize, record: &FileJobRecord) {
        self.bus.broadcast(EventPayload::FileProgress {
            batch_id,
            index,
            progress: record.progress_percent,
            status: record.status_text.clone(),
            is_complete: record.is_complete,
            has_error: record.has_error,
            size_before: record.size_before,
            size_after: record.size_after,
        });
    }

    fn status_changed(&self, batch_id: Option<BatchId>, text: &str) {
        self.bus.broadcast(EventPayload::StatusChanged {
            batch_id,
            text: text.to_string(),
        });
    }

    fn batch_completed(&self, batch_id: BatchId, succeeded: usize, failed: usize) {
        self.bus.broadcast(EventPayload::BatchCompleted {
            batch_id,
            succeeded,
            failed,
        });
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

struct Inner {
    state: RwLock<Shared>,
    sink: Arc<dyn ProgressSink>,
}

#[derive(Default)]
struct Shared {
    batch: BatchState,
    /// Index of the file whose engine command is running, if any.
    in_flight: Option<usize>,
}

/// Shared handle to the batch state. Cheap to clone.
#[derive(Clone)]
pub struct Reporter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl Reporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Shared::default()),
                sink,
            }),
        }
    }

    /// Copy of the current batch state.
    pub fn snapshot(&self) -> BatchState {
        self.inner.state.read().batch.clone()
    }

    pub fn is_current(&self, batch_id: BatchId) -> bool {
        self.inner.state.read().batch.is_current(batch_id)
    }

    /// Index of the file currently inside the engine, if any.
    pub fn in_flight(&self) -> Option<usize> {
        self.inner.state.read().in_flight
    }

    /// Replace the previous batch with fresh records for `files`.
    pub(crate) fn start_batch(&self, files: &[InputFile]) -> BatchId {
        let batch_id = BatchId::new();
        let records = {
            let mut state = self.inner.state.write();
            state.batch.reset(batch_id, files);
            state.in_flight = None;
            state.batch.records.clone()
        };
        self.inner.sink.batch_started(batch_id, &records);
        batch_id
    }

    /// Set the overall status line. Text for a batch other than the current
    /// one is ignored; `None` addresses whatever is current.
    pub fn set_status(&self, batch_id: Option<BatchId>, text: &str) -> bool {
        {
            let mut state = self.inner.state.write();
            if let Some(id) = batch_id {
                if !state.batch.is_current(id) {
                    return false;
                }
            }
            state.batch.status_text = text.to_string();
        }
        self.inner.sink.status_changed(batch_id, text);
        true
    }

    /// Merge `update` into one record. Returns `false` when the update was
    /// dropped because the batch is stale or the index out of range.
    pub fn update(&self, batch_id: BatchId, index: usize, update: &ProgressUpdate) -> bool {
        let record = {
            let mut state = self.inner.state.write();
            if !state.batch.is_current(batch_id) {
                return false;
            }
            state.batch.apply(index, update)
        };
        self.notify(batch_id, index, record)
    }

    /// Move a running file forward to `percent`. Ignored unless `index` is
    /// the file in flight and the new value is strictly higher.
    fn advance(&self, batch_id: BatchId, index: usize, percent: u8, status: &str) -> bool {
        let record = {
            let mut state = self.inner.state.write();
            if !state.batch.is_current(batch_id) || state.in_flight != Some(index) {
                return false;
            }
            match state.batch.records.get(index) {
                Some(r) if !r.is_settled() && percent > r.progress_percent => {}
                _ => return false,
            }
            state
                .batch
                .apply(index, &ProgressUpdate::phase(percent, status))
        };
        self.notify(batch_id, index, record)
    }

    /// Store both outputs and mark the record complete in one step.
    pub(crate) fn complete_file(
        &self,
        batch_id: BatchId,
        index: usize,
        video: ProcessedOutput,
        thumbnail: ProcessedOutput,
        status: &str,
    ) -> bool {
        let size_after = video.size();
        let record = {
            let mut state = self.inner.state.write();
            if !state.batch.is_current(batch_id)
                || !state.batch.store_outputs(index, video, thumbnail)
            {
                return false;
            }
            state
                .batch
                .apply(index, &ProgressUpdate::complete(status, size_after))
        };
        self.notify(batch_id, index, record)
    }

    pub(crate) fn finish_batch(&self, batch_id: BatchId) -> Option<(usize, usize)> {
        let counts = {
            let state = self.inner.state.read();
            if !state.batch.is_current(batch_id) {
                return None;
            }
            (state.batch.succeeded(), state.batch.failed())
        };
        self.inner.sink.batch_completed(batch_id, counts.0, counts.1);
        Some(counts)
    }

    fn notify(&self, batch_id: BatchId, index: usize, record: Option<FileJobRecord>) -> bool {
        match record {
            Some(record) => {
                self.inner.sink.file_updated(batch_id, index, &record);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressRoute
// ---------------------------------------------------------------------------

/// Marks one file as in flight for as long as the scope lives.
///
/// Engine progress is only routed to the file whose scope is open. Dropping
/// the scope clears the marker on every exit path.
#[derive(Debug)]
pub struct ProgressRoute {
    reporter: Reporter,
    batch_id: BatchId,
    index: usize,
}

impl ProgressRoute {
    pub fn enter(reporter: Reporter, batch_id: BatchId, index: usize) -> Self {
        {
            let mut state = reporter.inner.state.write();
            if state.batch.is_current(batch_id) {
                state.in_flight = Some(index);
            }
        }
        Self {
            reporter,
            batch_id,
            index,
        }
    }

    /// Apply a phase update to this file.
    pub fn update(&self, update: &ProgressUpdate) -> bool {
        self.reporter.update(self.batch_id, self.index, update)
    }

    /// Callback mapping an engine ratio into `from..=to` percent.
    pub fn ratio_callback(&self, from: u8, to: u8, status: &'static str) -> RatioCallback {
        let reporter = self.reporter.clone();
        let batch_id = self.batch_id;
        let index = self.index;
        let span = f64::from(to.saturating_sub(from));
        Arc::new(move |ratio: f64| {
            let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
            let percent = from.saturating_add((ratio * span).round() as u8).min(to);
            reporter.advance(batch_id, index, percent, status);
        })
    }
}

impl Drop for ProgressRoute {
    fn drop(&mut self) {
        let mut state = self.reporter.inner.state.write();
        if state.batch.is_current(self.batch_id) && state.in_flight == Some(self.index) {
            state.in_flight = None;
        }
    }
}
