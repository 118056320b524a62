//! Batch orchestrator: runs every accepted file through the engine, one at
//! a time, and reports progress as it goes.

use std::sync::Arc;

use mp_core::config::Config;
use mp_core::{detect_media_type, BatchId, InputFile, ProcessedOutput, IMAGE_JPEG};
use mp_engine::{Engine, TemplateContext};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::acceptance::{accept_files, Acceptance};
use crate::naming::DerivedNames;
use crate::record::ProgressUpdate;
use crate::reporter::{ProgressRoute, Reporter};

/// Per-file phase texts.
pub mod phase {
    pub const LOADING_FILE: &str = "Loading file";
    pub const STARTING: &str = "Starting compression";
    pub const COMPRESSING: &str = "Compressing";
    pub const CREATING_THUMBNAIL: &str = "Creating thumbnail";
    pub const FINALIZING: &str = "Finalizing";
    pub const COMPLETE: &str = "Complete";
}

/// Overall status texts.
pub mod status {
    pub const LOADING_ENGINE: &str = "Loading engine";
    pub const ALL_COMPLETE: &str = "All compressions complete";

    pub fn compressing(position: usize, total: usize, name: &str) -> String {
        format!("Compressing ({position}/{total}): {name}")
    }
}

const PCT_LOADING_FILE: u8 = 1;
const PCT_STARTING: u8 = 2;
const PCT_THUMBNAIL: u8 = 98;
const PCT_FINALIZING: u8 = 99;

/// Transcode and thumbnail argument templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplates {
    pub transcode: Vec<String>,
    pub thumbnail: Vec<String>,
}

impl CommandTemplates {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transcode: config.transcode.transcode_args(),
            thumbnail: config.transcode.thumbnail_args(),
        }
    }
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counts for a batch that ran to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// How a [`BatchOrchestrator::process_batch`] call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchReport {
    /// No file had the accepted media type; nothing ran.
    Rejected { message: String },
    /// Every accepted file was attempted.
    Completed(BatchSummary),
    /// A newer batch replaced this one before it finished.
    Superseded { batch_id: BatchId },
}

/// Why a single file stopped early.
enum FileFailure {
    Error(mp_core::Error),
    Superseded,
}

impl From<mp_core::Error> for FileFailure {
    fn from(e: mp_core::Error) -> Self {
        FileFailure::Error(e)
    }
}

/// Drives an [`Engine`] over a batch of input files.
///
/// Engine access is serialised: a file holds the engine for its whole
/// write/transcode/read/thumbnail/read/cleanup sequence, so scratch names
/// reused by a newer batch are never touched concurrently.
pub struct BatchOrchestrator<E: Engine + ?Sized> {
    engine: Arc<E>,
    templates: CommandTemplates,
    accepted_media_type: String,
    reporter: Reporter,
    engine_lock: Mutex<()>,
}

impl<E: Engine + ?Sized> std::fmt::Debug for BatchOrchestrator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("engine", &self.engine.name())
            .field("templates", &self.templates)
            .field("accepted_media_type", &self.accepted_media_type)
            .finish_non_exhaustive()
    }
}

impl<E: Engine + ?Sized> BatchOrchestrator<E> {
    pub fn new(engine: Arc<E>, templates: CommandTemplates, reporter: Reporter) -> Self {
        Self {
            engine,
            templates,
            accepted_media_type: mp_core::VIDEO_MP4.to_string(),
            reporter,
            engine_lock: Mutex::new(()),
        }
    }

    /// Build an orchestrator from the `[acceptance]` and `[transcode]`
    /// config sections.
    pub fn from_config(engine: Arc<E>, config: &Config, reporter: Reporter) -> Self {
        Self::new(engine, CommandTemplates::from_config(config), reporter)
            .with_accepted_media_type(config.acceptance.media_type.clone())
    }

    pub fn with_accepted_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.accepted_media_type = media_type.into();
        self
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Process `files` sequentially.
    ///
    /// Per-file failures are recorded on the file's job record and never
    /// returned. A call made while another batch is running replaces it.
    ///
    /// # Errors
    ///
    /// [`mp_core::Error::EngineLoad`] when the engine cannot be loaded; no
    /// batch state is touched in that case.
    pub async fn process_batch(&self, files: Vec<InputFile>) -> mp_core::Result<BatchReport> {
        let files = match accept_files(files, &self.accepted_media_type) {
            Acceptance::Accepted(files) => files,
            Acceptance::NoneMatched { message } => {
                tracing::warn!("{message}");
                self.reporter.set_status(None, &message);
                return Ok(BatchReport::Rejected { message });
            }
        };

        if !self.engine.is_loaded() {
            self.reporter.set_status(None, status::LOADING_ENGINE);
        }
        if let Err(e) = self.engine.load().await {
            let e = match e {
                mp_core::Error::EngineLoad(_) => e,
                other => mp_core::Error::engine_load(other.to_string()),
            };
            tracing::error!("Failed to load {} engine: {e}", self.engine.name());
            self.reporter.set_status(None, &format!("Error: {e}"));
            return Err(e);
        }

        let batch_id = self.reporter.start_batch(&files);
        let total = files.len();
        tracing::info!("Batch {batch_id}: {total} file(s)");

        for (index, file) in files.iter().enumerate() {
            let _engine = self.engine_lock.lock().await;
            if !self.reporter.is_current(batch_id) {
                tracing::info!("Batch {batch_id} superseded before {}", file.name);
                return Ok(BatchReport::Superseded { batch_id });
            }

            self.reporter
                .set_status(Some(batch_id), &status::compressing(index + 1, total, &file.name));

            if !self.process_file(batch_id, index, file).await {
                tracing::info!("Batch {batch_id} superseded during {}", file.name);
                return Ok(BatchReport::Superseded { batch_id });
            }
        }

        self.reporter.set_status(Some(batch_id), status::ALL_COMPLETE);
        match self.reporter.finish_batch(batch_id) {
            Some((succeeded, failed)) => {
                tracing::info!("Batch {batch_id} done: {succeeded} succeeded, {failed} failed");
                Ok(BatchReport::Completed(BatchSummary {
                    batch_id,
                    total,
                    succeeded,
                    failed,
                }))
            }
            None => Ok(BatchReport::Superseded { batch_id }),
        }
    }

    /// Run one file and settle its record. Returns `false` if the batch was
    /// superseded while the file was in the engine.
    async fn process_file(&self, batch_id: BatchId, index: usize, file: &InputFile) -> bool {
        let names = DerivedNames::for_input(&file.name, index);
        let route = ProgressRoute::enter(self.reporter.clone(), batch_id, index);

        let result = self.run_steps(&route, batch_id, file, &names).await;

        for name in names.scratch_names() {
            self.engine.remove(name).await;
        }
        drop(route);

        match result {
            Ok((video, thumbnail)) => {
                tracing::info!(
                    "{}: {} -> {} bytes",
                    file.name,
                    file.size,
                    video.size()
                );
                self.reporter
                    .complete_file(batch_id, index, video, thumbnail, phase::COMPLETE)
            }
            Err(FileFailure::Error(e)) => {
                tracing::error!("Failed to compress {}: {e}", file.name);
                self.reporter
                    .update(batch_id, index, &ProgressUpdate::failed(&e));
                self.reporter.is_current(batch_id)
            }
            Err(FileFailure::Superseded) => false,
        }
    }

    async fn run_steps(
        &self,
        route: &ProgressRoute,
        batch_id: BatchId,
        file: &InputFile,
        names: &DerivedNames,
    ) -> Result<(ProcessedOutput, ProcessedOutput), FileFailure> {
        route.update(&ProgressUpdate::phase(PCT_LOADING_FILE, phase::LOADING_FILE));
        let data = file.read_bytes().await?;
        self.engine.write_input(&names.scratch_input, data).await?;
        self.ensure_current(batch_id)?;

        route.update(
            &ProgressUpdate::phase(PCT_STARTING, phase::STARTING).with_size_before(file.size),
        );
        let args = self.command_args(&self.templates.transcode, names, &names.output, file);
        let callback = route.ratio_callback(PCT_STARTING, PCT_THUMBNAIL, phase::COMPRESSING);
        self.engine.run(&args, Some(callback)).await?;
        self.ensure_current(batch_id)?;

        route.update(&ProgressUpdate::phase(PCT_THUMBNAIL, phase::CREATING_THUMBNAIL));
        let video = ProcessedOutput::new(
            names.output.clone(),
            detect_media_type(&names.output),
            self.engine.read_output(&names.output).await?,
        );

        let args = self.command_args(&self.templates.thumbnail, names, &names.thumbnail, file);
        self.engine.run(&args, None).await?;
        self.ensure_current(batch_id)?;

        route.update(&ProgressUpdate::phase(PCT_FINALIZING, phase::FINALIZING));
        let thumbnail = ProcessedOutput::new(
            names.thumbnail.clone(),
            IMAGE_JPEG,
            self.engine.read_output(&names.thumbnail).await?,
        );

        Ok((video, thumbnail))
    }

    /// Fill `template` for one engine command. Stored names go through
    /// [`Engine::name_arg`] since they carry the user's file stem.
    fn command_args(
        &self,
        template: &[String],
        names: &DerivedNames,
        output: &str,
        file: &InputFile,
    ) -> Vec<String> {
        TemplateContext::new()
            .with_names(
                &self.engine.name_arg(&names.scratch_input),
                &self.engine.name_arg(output),
                &file.name,
            )
            .substitute_all(template)
    }

    fn ensure_current(&self, batch_id: BatchId) -> Result<(), FileFailure> {
        if self.reporter.is_current(batch_id) {
            Ok(())
        } else {
            Err(FileFailure::Superseded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use mp_engine::RatioCallback;
    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::Notify;

    use crate::record::{FileJobRecord, JobStatus};
    use crate::reporter::ProgressSink;

    /// Input bytes that make the transcode step fail.
    const BAD_TRANSCODE: &[u8] = b"corrupt";
    /// Input bytes that make the thumbnail step fail.
    const BAD_THUMBNAIL: &[u8] = b"no frames";
    /// Prefix the scripted engine puts on stored names inside arguments.
    const STORED: &str = "stored:";

    /// In-memory engine that "compresses" by halving the input and logs
    /// every call.
    #[derive(Default)]
    struct ScriptedEngine {
        files: SyncMutex<HashMap<String, Bytes>>,
        calls: SyncMutex<Vec<String>>,
        argv: SyncMutex<Vec<Vec<String>>>,
        loads: AtomicUsize,
        fail_load: bool,
        /// When set, the first run waits here after signalling `entered`.
        gate: Option<Arc<Notify>>,
        entered: Arc<Notify>,
        runs: AtomicUsize,
    }

    impl ScriptedEngine {
        fn failing_load() -> Self {
            Self {
                fail_load: true,
                ..Self::default()
            }
        }

        fn gated() -> Self {
            Self {
                gate: Some(Arc::new(Notify::new())),
                ..Self::default()
            }
        }

        fn argv(&self) -> Vec<Vec<String>> {
            self.argv.lock().clone()
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn stored(&self) -> Vec<String> {
            let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl Engine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn load(&self) -> mp_core::Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_load {
                return Err(mp_core::Error::engine_load("engine binary missing"));
            }
            Ok(())
        }

        fn is_loaded(&self) -> bool {
            !self.fail_load && self.loads.load(Ordering::SeqCst) > 0
        }

        fn name_arg(&self, name: &str) -> String {
            format!("{STORED}{name}")
        }

        async fn write_input(&self, name: &str, data: Bytes) -> mp_core::Result<()> {
            self.calls.lock().push(format!("write {name}"));
            self.files.lock().insert(name.to_string(), data);
            Ok(())
        }

        async fn run(&self, args: &[String], progress: Option<RatioCallback>) -> mp_core::Result<()> {
            self.argv.lock().push(args.to_vec());
            let stored = |arg: &String| arg.strip_prefix(STORED).unwrap_or(arg).to_string();
            let input = args
                .iter()
                .position(|a| a == "-i")
                .and_then(|i| args.get(i + 1))
                .map(stored)
                .unwrap_or_default();
            let output = args.last().map(stored).unwrap_or_default();
            self.calls.lock().push(format!("run {input} -> {output}"));

            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(gate) = &self.gate {
                    self.entered.notify_one();
                    gate.notified().await;
                }
            }

            let data = self.files.lock().get(&input).cloned().ok_or_else(|| {
                mp_core::Error::engine("scripted", format!("{input}: No such file"))
            })?;

            let thumbnail = output.ends_with(".jpg");
            if (!thumbnail && data.as_ref() == BAD_TRANSCODE)
                || (thumbnail && data.as_ref() == BAD_THUMBNAIL)
            {
                return Err(mp_core::Error::engine(
                    "scripted",
                    "Invalid data found when processing input",
                ));
            }

            if let Some(cb) = progress {
                for ratio in [0.25, 0.5, 0.1, 1.0] {
                    cb(ratio);
                }
            }

            let produced = if thumbnail {
                Bytes::from_static(b"\xff\xd8jpeg")
            } else {
                data.slice(..data.len() / 2)
            };
            self.files.lock().insert(output, produced);
            Ok(())
        }

        async fn read_output(&self, name: &str) -> mp_core::Result<Bytes> {
            self.calls.lock().push(format!("read {name}"));
            self.files
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| mp_core::Error::not_found("scratch file", name))
        }

        async fn remove(&self, name: &str) {
            self.calls.lock().push(format!("remove {name}"));
            self.files.lock().remove(name);
        }
    }

    /// Sink recording every per-file update and status line.
    #[derive(Default)]
    struct Recorder {
        updates: SyncMutex<Vec<(usize, FileJobRecord)>>,
        statuses: SyncMutex<Vec<String>>,
    }

    impl ProgressSink for Recorder {
        fn file_updated(&self, _batch_id: BatchId, index: usize, record: &FileJobRecord) {
            self.updates.lock().push((index, record.clone()));
        }

        fn status_changed(&self, _batch_id: Option<BatchId>, text: &str) {
            self.statuses.lock().push(text.to_string());
        }
    }

    fn mp4(name: &str, data: &'static [u8]) -> InputFile {
        InputFile::from_bytes(name, "video/mp4", Bytes::from_static(data))
    }

    fn setup(engine: ScriptedEngine) -> (Arc<ScriptedEngine>, Arc<Recorder>, BatchOrchestrator<ScriptedEngine>) {
        let engine = Arc::new(engine);
        let sink = Arc::new(Recorder::default());
        let orchestrator = BatchOrchestrator::new(
            engine.clone(),
            CommandTemplates::default(),
            Reporter::new(sink.clone()),
        );
        (engine, sink, orchestrator)
    }

    #[tokio::test]
    async fn single_file_runs_every_step_in_order() {
        let (engine, sink, orch) = setup(ScriptedEngine::default());
        let report = orch
            .process_batch(vec![mp4("holiday.mp4", b"0123456789")])
            .await
            .unwrap();

        assert!(matches!(
            report,
            BatchReport::Completed(BatchSummary { total: 1, succeeded: 1, failed: 0, .. })
        ));
        assert_eq!(
            engine.calls(),
            vec![
                "write input0.mp4",
                "run input0.mp4 -> holiday-compressed.mp4",
                "read holiday-compressed.mp4",
                "run input0.mp4 -> holiday-thumbnail.jpg",
                "read holiday-thumbnail.jpg",
                "remove input0.mp4",
                "remove holiday-compressed.mp4",
                "remove holiday-thumbnail.jpg",
            ]
        );
        assert!(engine.stored().is_empty());

        let snap = orch.reporter().snapshot();
        let record = &snap.records[0];
        assert_eq!(record.progress_percent, 100);
        assert_eq!(record.status_text, "Complete");
        assert!(record.is_complete);
        assert_eq!(record.size_before, 10);
        assert_eq!(record.size_after, Some(5));
        assert_eq!(record.status(), JobStatus::Complete);

        let video = snap.videos[0].as_ref().unwrap();
        assert_eq!(video.filename, "holiday-compressed.mp4");
        assert_eq!(video.media_type, "video/mp4");
        assert_eq!(video.data, Bytes::from_static(b"01234"));
        let thumb = snap.thumbnails[0].as_ref().unwrap();
        assert_eq!(thumb.filename, "holiday-thumbnail.jpg");
        assert_eq!(thumb.media_type, "image/jpeg");
        assert_eq!(snap.status_text, "All compressions complete");

        let statuses = sink.statuses.lock().clone();
        assert_eq!(
            statuses,
            vec![
                "Loading engine",
                "Compressing (1/1): holiday.mp4",
                "All compressions complete",
            ]
        );
    }

    #[tokio::test]
    async fn phases_are_reported_with_monotonic_progress() {
        let (_engine, sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![mp4("a.mp4", b"abcdef")]).await.unwrap();

        let updates = sink.updates.lock().clone();
        let phases: Vec<(u8, String)> = updates
            .iter()
            .map(|(_, r)| (r.progress_percent, r.status_text.clone()))
            .collect();
        assert_eq!(
            phases,
            vec![
                (1, "Loading file".to_string()),
                (2, "Starting compression".to_string()),
                (26, "Compressing".to_string()),
                (50, "Compressing".to_string()),
                (98, "Compressing".to_string()),
                (98, "Creating thumbnail".to_string()),
                (99, "Finalizing".to_string()),
                (100, "Complete".to_string()),
            ]
        );
        assert!(phases.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn files_are_processed_strictly_in_order() {
        let (engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![
            mp4("a.mp4", b"aaaa"),
            mp4("b.mp4", b"bbbb"),
            mp4("c.mp4", b"cccc"),
        ])
        .await
        .unwrap();

        let calls = engine.calls();
        let writes: Vec<&String> = calls.iter().filter(|c| c.starts_with("write")).collect();
        assert_eq!(writes, vec!["write input0.mp4", "write input1.mp4", "write input2.mp4"]);

        // Every step of file i happens before the first step of file i+1.
        let last_of_a = calls.iter().rposition(|c| c == "remove a-thumbnail.jpg").unwrap();
        let first_of_b = calls.iter().position(|c| c == "write input1.mp4").unwrap();
        assert!(last_of_a < first_of_b);
    }

    #[tokio::test]
    async fn every_file_is_cleaned_up_exactly_once() {
        let (engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![
            mp4("ok.mp4", b"fine data"),
            mp4("bad.mp4", BAD_TRANSCODE),
            mp4("nothumb.mp4", BAD_THUMBNAIL),
        ])
        .await
        .unwrap();

        let calls = engine.calls();
        for name in [
            "input0.mp4",
            "ok-compressed.mp4",
            "ok-thumbnail.jpg",
            "input1.mp4",
            "bad-compressed.mp4",
            "bad-thumbnail.jpg",
            "input2.mp4",
            "nothumb-compressed.mp4",
            "nothumb-thumbnail.jpg",
        ] {
            let removes = calls.iter().filter(|c| **c == format!("remove {name}")).count();
            assert_eq!(removes, 1, "{name}");
        }
        assert!(engine.stored().is_empty());
    }

    #[tokio::test]
    async fn failed_file_leaves_gap_and_batch_continues() {
        let (_engine, _sink, orch) = setup(ScriptedEngine::default());
        let report = orch
            .process_batch(vec![
                mp4("a.mp4", b"aaaaaa"),
                mp4("broken.mp4", BAD_TRANSCODE),
                mp4("c.mp4", b"cccccc"),
            ])
            .await
            .unwrap();

        assert!(matches!(
            report,
            BatchReport::Completed(BatchSummary { total: 3, succeeded: 2, failed: 1, .. })
        ));

        let snap = orch.reporter().snapshot();
        assert_eq!(snap.records.len(), 3);
        assert_eq!(snap.videos.len(), 3);
        assert_eq!(snap.thumbnails.len(), 3);
        assert!(snap.videos[0].is_some());
        assert!(snap.videos[1].is_none());
        assert!(snap.thumbnails[1].is_none());
        assert!(snap.videos[2].is_some());

        let failed = &snap.records[1];
        assert!(failed.has_error);
        assert!(!failed.is_complete);
        assert_eq!(failed.progress_percent, 0);
        assert!(failed.status_text.starts_with("Error: "));
        assert!(failed.status_text.contains("Invalid data found"));
        assert_eq!(failed.size_after, None);
    }

    #[tokio::test]
    async fn thumbnail_failure_discards_video_too() {
        let (_engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![mp4("nothumb.mp4", BAD_THUMBNAIL)])
            .await
            .unwrap();

        let snap = orch.reporter().snapshot();
        assert!(snap.records[0].has_error);
        assert!(snap.videos[0].is_none());
        assert!(snap.thumbnails[0].is_none());
        assert!(!snap.has_outputs());
    }

    #[tokio::test]
    async fn outputs_exist_only_for_completed_records() {
        let (_engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![
            mp4("a.mp4", BAD_TRANSCODE),
            mp4("b.mp4", b"bbbbbbbb"),
        ])
        .await
        .unwrap();

        let snap = orch.reporter().snapshot();
        for (i, record) in snap.records.iter().enumerate() {
            assert_eq!(snap.videos[i].is_some(), record.is_complete);
            assert_eq!(snap.thumbnails[i].is_some(), record.is_complete);
            assert!(!(record.is_complete && record.has_error));
        }
    }

    #[tokio::test]
    async fn nothing_accepted_leaves_state_untouched() {
        let (engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![mp4("first.mp4", b"1234")]).await.unwrap();
        let before = orch.reporter().snapshot();

        let report = orch
            .process_batch(vec![InputFile::from_bytes(
                "notes.txt",
                "text/plain",
                Bytes::from_static(b"hello"),
            )])
            .await
            .unwrap();

        assert_eq!(
            report,
            BatchReport::Rejected {
                message: "Please select MP4 files only.".into()
            }
        );
        let after = orch.reporter().snapshot();
        assert_eq!(after.batch_id, before.batch_id);
        assert_eq!(after.records, before.records);
        assert_eq!(after.status_text, "Please select MP4 files only.");
        assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mixed_batch_keeps_only_accepted_files() {
        let (engine, _sink, orch) = setup(ScriptedEngine::default());
        let report = orch
            .process_batch(vec![
                mp4("a.mp4", b"aaaa"),
                InputFile::from_bytes("notes.txt", "text/plain", Bytes::from_static(b"hello")),
                mp4("b.mp4", b"bbbbbb"),
            ])
            .await
            .unwrap();

        assert!(matches!(
            report,
            BatchReport::Completed(BatchSummary { total: 2, succeeded: 2, failed: 0, .. })
        ));
        let snap = orch.reporter().snapshot();
        let names: Vec<&str> = snap.records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
        assert_eq!(snap.videos.len(), 2);
        assert_eq!(snap.videos[0].as_ref().unwrap().filename, "a-compressed.mp4");
        assert_eq!(snap.videos[1].as_ref().unwrap().filename, "b-compressed.mp4");
        assert_eq!(snap.thumbnails[1].as_ref().unwrap().filename, "b-thumbnail.jpg");

        let writes: Vec<String> = engine
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("write "))
            .collect();
        assert_eq!(writes, vec!["write input0.mp4", "write input1.mp4"]);
        assert!(!engine.calls().iter().any(|c| c.contains("notes")));
    }

    #[tokio::test]
    async fn stored_names_reach_the_engine_qualified() {
        let (engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![mp4("-x.mp4", b"0123")]).await.unwrap();

        assert_eq!(
            engine.argv(),
            vec![
                vec!["-i", "stored:input0.mp4", "stored:-x-compressed.mp4"],
                vec![
                    "-i",
                    "stored:input0.mp4",
                    "-frames:v",
                    "1",
                    "-update",
                    "1",
                    "stored:-x-thumbnail.jpg",
                ],
            ]
        );
        assert!(engine.calls().contains(&"read -x-compressed.mp4".to_string()));
        assert!(engine.calls().contains(&"remove -x-thumbnail.jpg".to_string()));

        let snap = orch.reporter().snapshot();
        assert!(snap.records[0].is_complete);
        assert_eq!(snap.videos[0].as_ref().unwrap().filename, "-x-compressed.mp4");
        assert_eq!(snap.thumbnails[0].as_ref().unwrap().filename, "-x-thumbnail.jpg");
    }

    #[tokio::test]
    async fn engine_load_failure_is_fatal() {
        let (engine, sink, orch) = setup(ScriptedEngine::failing_load());
        let err = orch
            .process_batch(vec![mp4("a.mp4", b"aaaa")])
            .await
            .unwrap_err();

        assert!(matches!(err, mp_core::Error::EngineLoad(_)));
        assert!(engine.calls().is_empty());
        assert!(sink.updates.lock().is_empty());
        let snap = orch.reporter().snapshot();
        assert!(snap.records.is_empty());
        assert!(snap.status_text.starts_with("Error: "));
    }

    #[tokio::test]
    async fn loading_status_is_shown_only_before_first_load() {
        let (engine, sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![mp4("a.mp4", b"aaaa")]).await.unwrap();
        orch.process_batch(vec![mp4("b.mp4", b"bbbb")]).await.unwrap();

        assert_eq!(engine.loads.load(Ordering::SeqCst), 2);
        let loading = sink
            .statuses
            .lock()
            .iter()
            .filter(|s| *s == "Loading engine")
            .count();
        assert_eq!(loading, 1);
    }

    #[tokio::test]
    async fn new_batch_resets_previous_state() {
        let (_engine, _sink, orch) = setup(ScriptedEngine::default());
        orch.process_batch(vec![mp4("a.mp4", b"aa"), mp4("b.mp4", b"bb")])
            .await
            .unwrap();
        let first = orch.reporter().snapshot().batch_id;

        orch.process_batch(vec![mp4("c.mp4", b"cccc")]).await.unwrap();
        let snap = orch.reporter().snapshot();
        assert_ne!(snap.batch_id, first);
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].filename, "c.mp4");
        assert_eq!(snap.videos.len(), 1);
        assert_eq!(snap.videos[0].as_ref().unwrap().filename, "c-compressed.mp4");
    }

    #[tokio::test]
    async fn superseded_batch_stops_after_in_flight_file() {
        let (engine, _sink, orch) = setup(ScriptedEngine::gated());
        let orch = Arc::new(orch);
        let gate = engine.gate.clone().unwrap();

        let first = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.process_batch(vec![mp4("a0.mp4", b"first0"), mp4("a1.mp4", b"first1")])
                    .await
            })
        };
        engine.entered.notified().await;

        let second = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.process_batch(vec![mp4("b0.mp4", b"second")]).await })
        };
        while orch.reporter().snapshot().records.first().map(|r| r.filename.as_str())
            != Some("b0.mp4")
        {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert!(matches!(first, BatchReport::Superseded { .. }));
        assert!(matches!(
            second,
            BatchReport::Completed(BatchSummary { total: 1, succeeded: 1, .. })
        ));

        let snap = orch.reporter().snapshot();
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].filename, "b0.mp4");
        assert!(snap.records[0].is_complete);
        assert_eq!(snap.videos[0].as_ref().unwrap().filename, "b0-compressed.mp4");
        assert_eq!(snap.videos[0].as_ref().unwrap().data, Bytes::from_static(b"sec"));

        let calls = engine.calls();
        // The old file is cleaned up before the new batch reuses input0.
        let old_cleanup = calls.iter().position(|c| c == "remove input0.mp4").unwrap();
        let new_write = calls.iter().rposition(|c| c == "write input0.mp4").unwrap();
        assert!(old_cleanup < new_write);
        assert!(!calls.iter().any(|c| c == "write input1.mp4"));
        assert!(engine.stored().is_empty());
    }
}
