//! # mp-batch
//!
//! Sequential batch compression on top of an [`mp_engine::Engine`].
//!
//! This crate provides:
//!
//! - **Acceptance** ([`accept_files`]) -- keep only inputs of the accepted
//!   media type.
//! - **Name derivation** ([`DerivedNames`]) -- scratch, output, and
//!   thumbnail names per input.
//! - **Job records** ([`FileJobRecord`], [`ProgressUpdate`],
//!   [`merge_update`]) -- per-file observable state and its partial-update
//!   merge.
//! - **[`Reporter`]** -- authoritative [`BatchState`] plus fan-out to a
//!   [`ProgressSink`].
//! - **[`BatchOrchestrator`]** -- runs each file through write, transcode,
//!   read, thumbnail, read, cleanup, strictly one file at a time.
//! - **[`ArchivePackager`]** -- bundles the produced outputs into one ZIP.

pub mod acceptance;
pub mod archive;
pub mod naming;
pub mod orchestrator;
pub mod record;
pub mod reporter;
pub mod state;

// Re-export key types at the crate root.
pub use acceptance::{accept_files, Acceptance};
pub use archive::{Archive, ArchivePackager};
pub use naming::DerivedNames;
pub use orchestrator::{BatchOrchestrator, BatchReport, BatchSummary, CommandTemplates};
pub use record::{merge_update, FileJobRecord, JobStatus, ProgressUpdate};
pub use reporter::{EventSink, NoopSink, ProgressRoute, ProgressSink, Reporter};
pub use state::BatchState;
