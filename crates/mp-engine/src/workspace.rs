//! Scratch storage for engine runs.
//!
//! A [`Workspace`] is the engine's working namespace: a temporary directory
//! whose entries are addressed by bare file names. Inputs are written into
//! it, the engine runs with it as its working directory, and outputs are read
//! back out of it. The directory is deleted when the workspace is dropped.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;

/// Engine working storage addressed by file name.
///
/// # Example
///
/// ```no_run
/// use mp_engine::Workspace;
///
/// # async fn example() -> mp_core::Result<()> {
/// let ws = Workspace::new(None)?;
/// ws.write("input0.mp4", bytes::Bytes::from_static(b"...")).await?;
/// let data = ws.read("input0.mp4").await?;
/// ws.remove("input0.mp4").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a new workspace, inside `parent` if given, otherwise in the
    /// system temp directory.
    pub fn new(parent: Option<&Path>) -> mp_core::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mp4press-");
        let temp_dir = match parent {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .map_err(|e| mp_core::Error::engine_load(format!("failed to create scratch dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the scratch directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Resolve a scratch name to its full path.
    pub fn path_of(&self, name: &str) -> mp_core::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.temp_dir.path().join(name))
    }

    /// Whether an entry with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.path_of(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Store `data` under `name`, replacing any previous entry.
    pub async fn write(&self, name: &str, data: Bytes) -> mp_core::Result<()> {
        let path = self.path_of(name)?;
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    /// Read the entry stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`mp_core::Error::NotFound`] if the entry does not exist.
    pub async fn read(&self, name: &str) -> mp_core::Result<Bytes> {
        let path = self.path_of(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(mp_core::Error::not_found("scratch file", name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the entry stored under `name`. Returns `false` if it was
    /// already absent.
    pub async fn remove(&self, name: &str) -> mp_core::Result<bool> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all entries currently stored, sorted.
    pub fn entries(&self) -> mp_core::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.temp_dir.path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Check that `name` is a bare file name that stays inside the workspace.
pub fn validate_name(name: &str) -> mp_core::Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(mp_core::Error::Validation(format!(
            "invalid scratch file name: {name:?}"
        )));
    }
    Ok(())
}
