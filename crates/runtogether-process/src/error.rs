//! Error types for child process control

use thiserror::Error;

/// Unified error type for spawning and signalling children
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed {
        /// The command that could not be launched
        command: String,
        /// The reason for the spawn failure
        reason: String,
    },

    /// Executable not found on the search path
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found
        command: String,
    },

    /// A command with no program was handed to a launcher
    #[error("empty command")]
    EmptyCommand,

    /// Failed to send signal to process
    #[error("failed to send signal {signal} to pid {pid}: {reason}")]
    SignalFailed {
        /// Target process id
        pid: u32,
        /// The signal number that failed to send
        signal: i32,
        /// The reason for the signal failure
        reason: String,
    },

    /// The OS did not confirm that a child was reclaimed
    #[error("failed to reap pid {pid}: {reason}")]
    ReapFailed {
        /// Target process id
        pid: u32,
        /// The reason for the failure
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Nix error (Unix signal handling)
    #[cfg(unix)]
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl Error {
    /// Create a spawn failed error, classifying "not found" separately
    pub fn spawn_failed(command: impl Into<String>, err: &std::io::Error) -> Self {
        let command = command.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::CommandNotFound { command }
        } else {
            Self::SpawnFailed {
                command,
                reason: err.to_string(),
            }
        }
    }

    /// Create a signal failed error
    pub fn signal_failed(pid: u32, signal: i32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            signal,
            reason: reason.into(),
        }
    }

    /// Create a reap failed error
    pub fn reap_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::ReapFailed {
            pid,
            reason: reason.into(),
        }
    }

    /// Returns true if this is a spawn-time failure
    pub fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. } | Self::CommandNotFound { .. } | Self::EmptyCommand
        )
    }

    /// Returns true if the target process no longer exists.
    ///
    /// Signalling a process that exited between the liveness check and the
    /// `kill` call is an expected race and callers treat it as success.
    pub fn is_process_gone(&self) -> bool {
        match self {
            #[cfg(unix)]
            Self::Nix(errno) => *errno == nix::errno::Errno::ESRCH,
            Self::Io(err) => err.raw_os_error() == Some(3),
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
