//! ZIP packaging of a batch's outputs.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use bytes::Bytes;
use mp_core::ProcessedOutput;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// A packaged archive ready to be saved.
#[derive(Clone, PartialEq, Eq)]
pub struct Archive {
    pub file_name: String,
    pub data: Bytes,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("file_name", &self.file_name)
            .field("size", &self.data.len())
            .field("entries", &self.entries)
            .finish()
    }
}

/// Bundles produced videos and thumbnails into one archive.
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    file_name: String,
}

impl Default for ArchivePackager {
    fn default() -> Self {
        Self::new(mp_core::config::DEFAULT_ARCHIVE_NAME)
    }
}

impl ArchivePackager {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Package every video, then every thumbnail, under their derived
    /// names. Returns `Ok(None)` when there is nothing to package.
    ///
    /// Entries carry a fixed timestamp, so packaging the same outputs twice
    /// yields identical bytes.
    pub fn package<'a>(
        &self,
        videos: impl IntoIterator<Item = &'a ProcessedOutput>,
        thumbnails: impl IntoIterator<Item = &'a ProcessedOutput>,
    ) -> mp_core::Result<Option<Archive>> {
        let outputs: Vec<&ProcessedOutput> = videos.into_iter().chain(thumbnails).collect();
        if outputs.is_empty() {
            tracing::debug!("Nothing to archive");
            return Ok(None);
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut used = HashSet::new();
        let mut entries = Vec::with_capacity(outputs.len());

        for output in outputs {
            let name = unique_name(&output.filename, &mut used);
            writer.start_file(name.as_str(), options).map_err(zip_error)?;
            writer.write_all(&output.data)?;
            entries.push(name);
        }

        let data = writer.finish().map_err(zip_error)?.into_inner();
        tracing::info!(
            "Packaged {} entries into {} ({} bytes)",
            entries.len(),
            self.file_name,
            data.len()
        );

        Ok(Some(Archive {
            file_name: self.file_name.clone(),
            data: Bytes::from(data),
            entries,
        }))
    }
}

fn zip_error(e: zip::result::ZipError) -> mp_core::Error {
    mp_core::Error::Archive(e.to_string())
}

/// `name`, or `stem (n).ext` for the first `n` not yet taken.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        })
        .find(|candidate| used.insert(candidate.clone()))
        .unwrap_or_else(|| name.to_string())
}
