//! ffmpeg-backed [`Engine`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::OnceCell;

use crate::command::ToolCommand;
use crate::engine::{Engine, RatioCallback};
use crate::progress::FfmpegProgress;
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// Flags prepended to every run: overwrite outputs, quiet banner, and a
/// machine-readable progress stream on stderr.
const BASE_ARGS: &[&str] = &["-y", "-hide_banner", "-nostats", "-progress", "pipe:2"];

/// State established by a successful [`Engine::load`].
#[derive(Debug)]
struct Loaded {
    ffmpeg: PathBuf,
    version: Option<String>,
    workspace: Workspace,
}

/// Runs ffmpeg as a subprocess inside a private scratch [`Workspace`].
#[derive(Debug)]
pub struct FfmpegEngine {
    config: mp_core::config::EngineConfig,
    loaded: OnceCell<Loaded>,
}

impl FfmpegEngine {
    /// Create an engine; nothing is touched until [`Engine::load`].
    pub fn new(config: mp_core::config::EngineConfig) -> Self {
        Self {
            config,
            loaded: OnceCell::new(),
        }
    }

    fn loaded(&self) -> mp_core::Result<&Loaded> {
        self.loaded
            .get()
            .ok_or_else(|| mp_core::Error::engine_load("ffmpeg engine is not loaded"))
    }

    /// First line of `ffmpeg -version`, once loaded.
    pub fn version(&self) -> Option<&str> {
        self.loaded.get().and_then(|l| l.version.as_deref())
    }

    async fn init(&self) -> mp_core::Result<Loaded> {
        let registry = ToolRegistry::discover(&self.config);
        let ffmpeg = registry.require("ffmpeg")?.path.clone();

        let output = ToolCommand::new(ffmpeg.clone())
            .arg("-version")
            .timeout(Duration::from_secs(30))
            .execute()
            .await
            .map_err(|e| mp_core::Error::engine_load(format!("ffmpeg did not start: {e}")))?;
        let version = output.stdout.lines().next().map(|s| s.to_string());

        let workspace = Workspace::new(self.config.scratch_dir.as_deref())?;

        tracing::info!(
            "Engine loaded: {} ({}), scratch dir {}",
            ffmpeg.display(),
            version.as_deref().unwrap_or("unknown version"),
            workspace.dir().display()
        );

        Ok(Loaded {
            ffmpeg,
            version,
            workspace,
        })
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self) -> mp_core::Result<()> {
        self.loaded.get_or_try_init(|| self.init()).await?;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// `file:` stops ffmpeg from reading a leading `-` as an option or a
    /// `name:` prefix as a protocol.
    fn name_arg(&self, name: &str) -> String {
        format!("file:{name}")
    }

    async fn write_input(&self, name: &str, data: Bytes) -> mp_core::Result<()> {
        let loaded = self.loaded()?;
        tracing::debug!("Engine write {name} ({} bytes)", data.len());
        loaded.workspace.write(name, data).await
    }

    async fn run(&self, args: &[String], progress: Option<RatioCallback>) -> mp_core::Result<()> {
        let loaded = self.loaded()?;

        let mut cmd = ToolCommand::new(loaded.ffmpeg.clone());
        cmd.current_dir(loaded.workspace.dir());
        cmd.timeout(Duration::from_secs(self.config.timeout_secs));
        cmd.args(BASE_ARGS.iter().copied());
        cmd.args(args.iter().cloned());

        tracing::debug!("Engine run: ffmpeg {}", cmd.get_args().join(" "));

        let mut parser = FfmpegProgress::new();
        cmd.execute_with_stderr_callback(|line| {
            if let Some(ratio) = parser.feed(line) {
                if let Some(ref callback) = progress {
                    callback(ratio);
                }
            }
        })
        .await?;

        Ok(())
    }

    async fn read_output(&self, name: &str) -> mp_core::Result<Bytes> {
        self.loaded()?.workspace.read(name).await
    }

    async fn remove(&self, name: &str) {
        let Ok(loaded) = self.loaded() else {
            return;
        };
        match loaded.workspace.remove(name).await {
            Ok(true) => tracing::debug!("Engine removed {name}"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to remove scratch file {name}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateContext;
    use mp_core::config::{EngineConfig, TranscodeConfig};

    /// Whether ffmpeg is on `PATH`; prints a skip line for `test` if not.
    fn ffmpeg_available(test: &str) -> bool {
        let found = which::which("ffmpeg").is_ok();
        if !found {
            eprintln!("Skipping {test}: ffmpeg not installed");
        }
        found
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Load an engine and store a one-second generated clip as `name`, or
    /// `None` if this ffmpeg build cannot generate one.
    async fn engine_with_clip(name: &str) -> Option<FfmpegEngine> {
        let engine = FfmpegEngine::new(EngineConfig::default());
        engine.load().await.unwrap();
        let make = vec![
            "-f".to_string(),
            "lavfi".into(),
            "-i".into(),
            "testsrc=duration=1:size=64x64:rate=10".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            engine.name_arg(name),
        ];
        match engine.run(&make, None).await {
            Ok(()) => Some(engine),
            Err(e) => {
                eprintln!("Skipping: ffmpeg cannot generate a test clip: {e}");
                None
            }
        }
    }

    #[test]
    fn stored_names_use_file_protocol() {
        let engine = FfmpegEngine::new(EngineConfig::default());
        assert_eq!(engine.name_arg("input0.mp4"), "file:input0.mp4");
        assert_eq!(engine.name_arg("-intro-compressed.mp4"), "file:-intro-compressed.mp4");
        assert_eq!(engine.name_arg("take:2-compressed.mp4"), "file:take:2-compressed.mp4");
    }

    #[tokio::test]
    async fn calls_before_load_fail() {
        let engine = FfmpegEngine::new(EngineConfig::default());
        assert!(!engine.is_loaded());

        let err = engine
            .write_input("input0.mp4", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, mp_core::Error::EngineLoad(_)));

        // Removing before load is silently ignored.
        engine.remove("input0.mp4").await;
    }

    #[tokio::test]
    async fn load_fails_for_missing_binary() {
        if which::which("ffmpeg").is_ok() {
            eprintln!("Skipping load_fails_for_missing_binary: PATH fallback finds ffmpeg");
            return;
        }
        let engine = FfmpegEngine::new(EngineConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ..EngineConfig::default()
        });
        let err = engine.load().await.unwrap_err();
        assert!(matches!(err, mp_core::Error::EngineLoad(_)));
        assert!(!engine.is_loaded());
    }

    #[tokio::test]
    async fn scratch_roundtrip_after_load() {
        if !ffmpeg_available("scratch_roundtrip_after_load") {
            return;
        }
        let engine = FfmpegEngine::new(EngineConfig::default());
        engine.load().await.unwrap();
        engine.load().await.unwrap();
        assert!(engine.is_loaded());
        assert!(engine.version().is_some());

        engine
            .write_input("input0.mp4", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(
            engine.read_output("input0.mp4").await.unwrap(),
            Bytes::from_static(b"data")
        );
        engine.remove("input0.mp4").await;
        engine.remove("input0.mp4").await;
        assert!(matches!(
            engine.read_output("input0.mp4").await,
            Err(mp_core::Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn run_on_garbage_input_is_engine_error() {
        if !ffmpeg_available("run_on_garbage_input_is_engine_error") {
            return;
        }
        let engine = FfmpegEngine::new(EngineConfig::default());
        engine.load().await.unwrap();
        engine
            .write_input("input0.mp4", Bytes::from_static(b"definitely not a video"))
            .await
            .unwrap();

        let args = strings(&["-i", "file:input0.mp4", "file:out.mp4"]);
        let err = engine.run(&args, None).await.unwrap_err();
        assert!(matches!(err, mp_core::Error::Engine { .. }));
    }

    #[tokio::test]
    async fn run_reports_progress_for_generated_clip() {
        if !ffmpeg_available("run_reports_progress_for_generated_clip") {
            return;
        }
        let Some(engine) = engine_with_clip("input0.mp4").await else {
            return;
        };

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::<f64>::new()));
        let sink = seen.clone();
        let callback: RatioCallback = std::sync::Arc::new(move |r| sink.lock().unwrap().push(r));

        let args = strings(&["-i", "file:input0.mp4", "file:input0-compressed.mp4"]);
        engine.run(&args, Some(callback)).await.unwrap();

        let ratios = seen.lock().unwrap().clone();
        assert!(!ratios.is_empty());
        assert_eq!(ratios.last().copied(), Some(1.0));
        assert!(engine.read_output("input0-compressed.mp4").await.is_ok());
    }

    #[tokio::test]
    async fn hostile_file_names_are_written_verbatim() {
        if !ffmpeg_available("hostile_file_names_are_written_verbatim") {
            return;
        }
        let Some(engine) = engine_with_clip("input0.mp4").await else {
            return;
        };
        let transcode = TranscodeConfig::default();

        for (output, thumbnail) in [
            ("-intro-compressed.mp4", "-intro-thumbnail.jpg"),
            ("take:2-compressed.mp4", "take:2-thumbnail.jpg"),
            ("clip%03d-compressed.mp4", "clip%03d-thumbnail.jpg"),
        ] {
            for (template, name) in [
                (transcode.transcode_args(), output),
                (transcode.thumbnail_args(), thumbnail),
            ] {
                let args = TemplateContext::new()
                    .with_names(
                        &engine.name_arg("input0.mp4"),
                        &engine.name_arg(name),
                        "clip.mp4",
                    )
                    .substitute_all(&template);
                engine.run(&args, None).await.unwrap();
                let data = engine.read_output(name).await.unwrap();
                assert!(!data.is_empty(), "{name} is empty");
                engine.remove(name).await;
            }
        }
        assert!(matches!(
            engine.read_output("clip001-thumbnail.jpg").await,
            Err(mp_core::Error::NotFound { .. })
        ));
    }
}
