//! Names derived from each input file.

/// Extension used when the input name has none.
const DEFAULT_EXTENSION: &str = "mp4";

/// Thumbnail image extension.
const THUMBNAIL_EXTENSION: &str = "jpg";

/// The three engine-storage names used while processing one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNames {
    /// Scratch name of the input bytes, unique per batch position.
    pub scratch_input: String,
    /// `<stem>-compressed.<ext>`
    pub output: String,
    /// `<stem>-thumbnail.jpg`
    pub thumbnail: String,
}

impl DerivedNames {
    /// Derive the names for the input at `index` named `filename`.
    ///
    /// Directory components are dropped, so every name is a bare file name.
    pub fn for_input(filename: &str, index: usize) -> Self {
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename);
        let (stem, ext) = split_extension(base);
        let stem = if stem.is_empty() { "video" } else { stem };
        let ext = ext.unwrap_or(DEFAULT_EXTENSION);

        Self {
            scratch_input: format!("input{index}.{ext}"),
            output: format!("{stem}-compressed.{ext}"),
            thumbnail: format!("{stem}-thumbnail.{THUMBNAIL_EXTENSION}"),
        }
    }

    /// All names to remove once the file has been processed.
    pub fn scratch_names(&self) -> [&str; 3] {
        [&self.scratch_input, &self.output, &self.thumbnail]
    }
}

/// Split `name` into stem and extension. A leading dot (`.hidden`) or a
/// trailing dot (`name.`) does not start an extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        Some((stem, "")) if !stem.is_empty() => (stem, None),
        _ => (name, None),
    }
}
