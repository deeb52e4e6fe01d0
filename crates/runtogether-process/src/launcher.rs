//! Launcher trait for turning commands into process handles

use async_trait::async_trait;

use crate::command::Command;
use crate::error::Result;
use crate::process::ProcessHandle;

/// Something that can start a [`Command`] and hand back a control handle
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning its control handle.
    ///
    /// Errors must be spawn errors (see [`crate::Error::is_spawn_error`]).
    async fn launch(&self, command: &Command) -> Result<Self::Handle>;
}
