//! Unified error type for mp4press.
//!
//! All crates funnel their failures into [`Error`]. The CLI derives its
//! process exit status from [`Error::exit_code`].

use std::fmt;

/// Unified error type covering all failure modes in mp4press.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// None of the supplied files matched the accepted media type.
    #[error("No accepted input: {0}")]
    NotAccepted(String),

    /// The transcoding engine could not be located or initialised.
    #[error("Engine load error: {0}")]
    EngineLoad(String),

    /// The engine (ffmpeg) failed while running a command.
    #[error("Engine error [{tool}]: {message}")]
    Engine {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A named entity (scratch artifact, tool, file) could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "scratch file").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Building the download archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotAccepted(_) => 2,
            Error::Validation(_) => 2,
            Error::EngineLoad(_) => 3,
            Error::Engine { .. } => 4,
            Error::NotFound { .. } => 4,
            Error::Io { .. } => 5,
            Error::Archive(_) => 5,
            Error::Internal(_) => 1,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Engine`].
    pub fn engine(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Engine {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EngineLoad`].
    pub fn engine_load(message: impl Into<String>) -> Self {
        Error::EngineLoad(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
