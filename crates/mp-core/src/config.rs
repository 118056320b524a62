//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! engine, acceptance, transcode, and archive sections. Every section
//! defaults sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::media::VIDEO_MP4;
use crate::Error;

/// Default archive name offered for "download all".
pub const DEFAULT_ARCHIVE_NAME: &str = "compressed_mp4_files_with_thumbnails.zip";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub acceptance: AcceptanceConfig,
    pub transcode: TranscodeConfig,
    pub archive: ArchiveConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.engine.timeout_secs == 0 {
            warnings.push("engine.timeout_secs is 0; every engine command will time out".into());
        }

        if let Some(path) = &self.engine.ffmpeg_path {
            if !path.exists() {
                warnings.push(format!(
                    "engine.ffmpeg_path {} does not exist; PATH lookup will be used",
                    path.display()
                ));
            }
        }

        if !self.acceptance.media_type.contains('/') {
            warnings.push(format!(
                "acceptance.media_type {:?} is not a type/subtype media type",
                self.acceptance.media_type
            ));
        }

        for (label, args) in [
            ("transcode.args", self.transcode.transcode_args()),
            ("transcode.thumbnail_args", self.transcode.thumbnail_args()),
        ] {
            if !args.iter().any(|a| a.contains("{input}")) {
                warnings.push(format!("{label} has no {{input}} placeholder"));
            }
            if !args.iter().any(|a| a.contains("{output}")) {
                warnings.push(format!("{label} has no {{output}} placeholder"));
            }
        }

        let thumbnail = self.transcode.thumbnail_args();
        if !thumbnail.windows(2).any(|w| w[0] == "-update" && w[1] == "1") {
            warnings.push(
                "transcode.thumbnail_args has no \"-update 1\"; file names containing % will be \
                 treated as frame patterns"
                    .into(),
            );
        }

        if self.archive.file_name.trim().is_empty() {
            warnings.push("archive.file_name is empty".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Location and limits of the external engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit ffmpeg executable; falls back to `PATH` lookup.
    pub ffmpeg_path: Option<PathBuf>,
    /// Maximum run time of a single engine command, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Parent directory for the scratch workspace (system temp dir if unset).
    pub scratch_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    86_400
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            timeout_secs: default_timeout_secs(),
            scratch_dir: None,
        }
    }
}

/// Which inputs a batch accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// The single accepted media type.
    #[serde(default = "default_media_type")]
    pub media_type: String,
}

fn default_media_type() -> String {
    VIDEO_MP4.into()
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            media_type: default_media_type(),
        }
    }
}

/// Named transcode argument sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodePreset {
    /// Let the engine pick codecs for the output container.
    #[default]
    Default,
    /// H.264 CRF 23 "medium" with 128k AAC audio.
    X264,
}

impl TranscodePreset {
    /// Argument template for this preset.
    pub fn args(self) -> Vec<String> {
        let args: &[&str] = match self {
            TranscodePreset::Default => &["-i", "{input}", "{output}"],
            TranscodePreset::X264 => &[
                "-i", "{input}", "-c:v", "libx264", "-crf", "23", "-preset", "medium", "-c:a",
                "aac", "-b:a", "128k", "{output}",
            ],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

/// Engine command templates. `{input}` and `{output}` are replaced with
/// scratch names; `{filename}`, `{filestem}` and `{extension}` describe the
/// original input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub preset: TranscodePreset,
    /// Explicit transcode template; overrides `preset` when set.
    pub args: Option<Vec<String>>,
    /// Explicit thumbnail template.
    pub thumbnail_args: Option<Vec<String>>,
}

impl TranscodeConfig {
    /// Resolved transcode argument template.
    pub fn transcode_args(&self) -> Vec<String> {
        self.args.clone().unwrap_or_else(|| self.preset.args())
    }

    /// Resolved thumbnail argument template (first frame as JPEG).
    ///
    /// `-update 1` makes the image muxer write `{output}` verbatim instead
    /// of expanding `%d` sequences found in the file name.
    pub fn thumbnail_args(&self) -> Vec<String> {
        self.thumbnail_args.clone().unwrap_or_else(|| {
            ["-i", "{input}", "-frames:v", "1", "-update", "1", "{output}"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }
}

/// Download archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_name")]
    pub file_name: String,
}

fn default_archive_name() -> String {
    DEFAULT_ARCHIVE_NAME.into()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: default_archive_name(),
        }
    }
}
