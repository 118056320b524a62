//! The engine contract driven by the batch orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

/// Receives the completion ratio (`0.0..=1.0`) of the running command.
pub type RatioCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// An opaque transcoding engine with its own file namespace.
///
/// Implementations share one namespace across every call, so callers must
/// pick distinct names for concurrent artifacts. All names are bare file
/// names.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Human-readable engine name for logs.
    fn name(&self) -> &str;

    /// Make the engine ready. Idempotent: later calls return immediately
    /// once loading has succeeded.
    ///
    /// # Errors
    ///
    /// [`mp_core::Error::EngineLoad`] when the engine cannot be started.
    async fn load(&self) -> mp_core::Result<()>;

    /// Whether [`Engine::load`] has completed successfully.
    fn is_loaded(&self) -> bool;

    /// How a stored `name` is spelled inside [`Engine::run`] arguments.
    ///
    /// Names derive from user file names, so an engine whose command line
    /// gives meaning to leading `-`, `scheme:` prefixes or similar must
    /// qualify them here. The default passes the name through.
    fn name_arg(&self, name: &str) -> String {
        name.to_string()
    }

    /// Store input bytes under `name`.
    async fn write_input(&self, name: &str, data: Bytes) -> mp_core::Result<()>;

    /// Run one engine command and wait for it to exit. `progress`, when
    /// given, receives completion ratios while the command runs.
    ///
    /// # Errors
    ///
    /// [`mp_core::Error::Engine`] on non-zero exit, crash, or timeout.
    async fn run(&self, args: &[String], progress: Option<RatioCallback>) -> mp_core::Result<()>;

    /// Read the bytes stored under `name`.
    ///
    /// # Errors
    ///
    /// [`mp_core::Error::NotFound`] when nothing is stored under `name`.
    async fn read_output(&self, name: &str) -> mp_core::Result<Bytes>;

    /// Delete whatever is stored under `name`. Never fails; an absent name
    /// is not an error.
    async fn remove(&self, name: &str);
}
