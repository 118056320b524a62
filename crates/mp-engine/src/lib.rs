//! # mp-engine
//!
//! The engine adapter: everything needed to treat ffmpeg as an opaque
//! command executor with its own file namespace.
//!
//! This crate provides:
//!
//! - **[`Engine`]** trait -- `load` / `write_input` / `run` / `read_output` /
//!   `remove`, the narrow contract the batch orchestrator drives.
//! - **[`FfmpegEngine`]** -- the ffmpeg-backed implementation.
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg/ffprobe and report
//!   their versions.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   and per-line stderr streaming.
//! - **Scratch storage** ([`Workspace`]) -- a temporary directory addressed
//!   by bare file names.
//! - **Progress parsing** ([`FfmpegProgress`]) -- turns `-progress` output
//!   into completion ratios.
//! - **Argument templates** ([`TemplateContext`]) -- `{input}`/`{output}`
//!   substitution for configured command lines.

pub mod command;
pub mod engine;
pub mod ffmpeg;
pub mod progress;
pub mod template;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{Engine, RatioCallback};
pub use ffmpeg::FfmpegEngine;
pub use progress::FfmpegProgress;
pub use template::TemplateContext;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
