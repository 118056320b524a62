//! Input-file model and media-type helpers.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Media type of MP4 video, the default accepted input type.
pub const VIDEO_MP4: &str = "video/mp4";

/// Media type of extracted thumbnails.
pub const IMAGE_JPEG: &str = "image/jpeg";

/// Fallback media type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect a media type from a file name's extension.
pub fn detect_media_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "mp4" => VIDEO_MP4,
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        "jpg" | "jpeg" => IMAGE_JPEG,
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => OCTET_STREAM,
    }
}

/// Compare two media types by essence (`type/subtype`), ignoring case and
/// any `; param=value` suffix.
pub fn media_type_matches(candidate: &str, accepted: &str) -> bool {
    fn essence(s: &str) -> &str {
        s.split(';').next().unwrap_or("").trim()
    }
    essence(candidate).eq_ignore_ascii_case(essence(accepted))
}

/// Where the bytes of an [`InputFile`] live.
#[derive(Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A file on disk, read lazily.
    Path(PathBuf),
    /// An in-memory buffer.
    Memory(Bytes),
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            InputSource::Memory(b) => write!(f, "Memory({} bytes)", b.len()),
        }
    }
}

/// A file offered to a batch. Owned by the caller and never mutated by the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Display name, including extension.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Declared media type.
    pub media_type: String,
    /// Location of the file contents.
    pub source: InputSource,
}

impl InputFile {
    /// Describe a file on disk. The media type is detected from the
    /// extension and the size is read from the file metadata.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            media_type: detect_media_type(&name).to_string(),
            name,
            size: metadata.len(),
            source: InputSource::Path(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory buffer with an explicit media type.
    pub fn from_bytes(name: impl Into<String>, media_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            media_type: media_type.into(),
            source: InputSource::Memory(data),
        }
    }

    /// Read the full contents of the file.
    pub async fn read_bytes(&self) -> Result<Bytes> {
        match &self.source {
            InputSource::Memory(data) => Ok(data.clone()),
            InputSource::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}

/// A produced output blob: the transcoded video or its thumbnail.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedOutput {
    /// Derived file name.
    pub filename: String,
    /// Media type the bytes are tagged with.
    pub media_type: String,
    /// Output bytes.
    #[serde(skip)]
    pub data: Bytes,
}

impl ProcessedOutput {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            data,
        }
    }

    /// Size of the output in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for ProcessedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedOutput")
            .field("filename", &self.filename)
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}
