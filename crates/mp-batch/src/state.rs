//! Authoritative state of the current batch.

use mp_core::{BatchId, InputFile, ProcessedOutput};
use serde::Serialize;

use crate::record::{merge_update, FileJobRecord, ProgressUpdate};

/// Records and outputs of the most recent batch.
///
/// `records`, `videos`, and `thumbnails` always have one slot per accepted
/// input. An output slot is `Some` only for files that completed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchState {
    pub batch_id: Option<BatchId>,
    pub records: Vec<FileJobRecord>,
    pub videos: Vec<Option<ProcessedOutput>>,
    pub thumbnails: Vec<Option<ProcessedOutput>>,
    /// Overall status line.
    pub status_text: String,
}

impl BatchState {
    /// Replace everything with a fresh batch of pending records.
    pub(crate) fn reset(&mut self, batch_id: BatchId, files: &[InputFile]) {
        self.batch_id = Some(batch_id);
        self.records = files.iter().map(FileJobRecord::pending).collect();
        self.videos = vec![None; files.len()];
        self.thumbnails = vec![None; files.len()];
    }

    pub fn is_current(&self, batch_id: BatchId) -> bool {
        self.batch_id == Some(batch_id)
    }

    /// Merge `update` into the record at `index`. Returns the new record,
    /// or `None` if `index` is out of range.
    pub(crate) fn apply(&mut self, index: usize, update: &ProgressUpdate) -> Option<FileJobRecord> {
        let slot = self.records.get_mut(index)?;
        *slot = merge_update(slot, update);
        Some(slot.clone())
    }

    pub(crate) fn store_outputs(
        &mut self,
        index: usize,
        video: ProcessedOutput,
        thumbnail: ProcessedOutput,
    ) -> bool {
        match (self.videos.get_mut(index), self.thumbnails.get_mut(index)) {
            (Some(v), Some(t)) => {
                *v = Some(video);
                *t = Some(thumbnail);
                true
            }
            _ => false,
        }
    }

    /// Produced videos, in input order, skipping failed files.
    pub fn video_outputs(&self) -> impl Iterator<Item = &ProcessedOutput> {
        self.videos.iter().flatten()
    }

    /// Produced thumbnails, in input order, skipping failed files.
    pub fn thumbnail_outputs(&self) -> impl Iterator<Item = &ProcessedOutput> {
        self.thumbnails.iter().flatten()
    }

    pub fn has_outputs(&self) -> bool {
        self.videos.iter().any(Option::is_some) || self.thumbnails.iter().any(Option::is_some)
    }

    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_complete).count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.has_error).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn files(n: usize) -> Vec<InputFile> {
        (0..n)
            .map(|i| {
                InputFile::from_bytes(format!("f{i}.mp4"), "video/mp4", Bytes::from_static(b"abc"))
            })
            .collect()
    }

    #[test]
    fn reset_sizes_every_collection() {
        let mut state = BatchState::default();
        let id = BatchId::new();
        state.reset(id, &files(3));
        assert!(state.is_current(id));
        assert_eq!(state.records.len(), 3);
        assert_eq!(state.videos.len(), 3);
        assert_eq!(state.thumbnails.len(), 3);
        assert!(!state.has_outputs());
    }

    #[test]
    fn apply_out_of_range_is_ignored() {
        let mut state = BatchState::default();
        state.reset(BatchId::new(), &files(1));
        assert!(state.apply(5, &ProgressUpdate::phase(1, "x")).is_none());
        assert!(state.apply(0, &ProgressUpdate::phase(1, "x")).is_some());
    }

    #[test]
    fn outputs_keep_positions() {
        let mut state = BatchState::default();
        state.reset(BatchId::new(), &files(3));
        let video = ProcessedOutput::new("f2-compressed.mp4", "video/mp4", Bytes::from_static(b"v"));
        let thumb = ProcessedOutput::new("f2-thumbnail.jpg", "image/jpeg", Bytes::from_static(b"t"));
        assert!(state.store_outputs(2, video, thumb));

        assert!(state.videos[0].is_none());
        assert!(state.videos[1].is_none());
        assert_eq!(state.videos[2].as_ref().unwrap().filename, "f2-compressed.mp4");
        assert_eq!(state.video_outputs().count(), 1);
        assert_eq!(state.thumbnail_outputs().count(), 1);
        assert!(state.has_outputs());
    }
}
