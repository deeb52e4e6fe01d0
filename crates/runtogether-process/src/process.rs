//! Process management traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A handle to one spawned child and the subtree hanging off it
///
/// Liveness is never cached while the child runs: every [`poll`](Self::poll)
/// asks the OS. Once an exit has been observed it is remembered forever and
/// later polls answer from that record.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (assigned at spawn, never changes)
    fn pid(&self) -> u32;

    /// Non-blocking liveness check.
    ///
    /// Reaps the child the first time it is seen exited.
    fn poll(&mut self) -> Result<PollStatus>;

    /// The exit status, if an exit has already been observed
    fn exit_status(&self) -> Option<&ExitStatus>;

    /// Ask the whole subtree to terminate (SIGTERM).
    ///
    /// Once the child itself has exited only its leftovers are signalled.
    fn terminate_gracefully(&mut self) -> Result<()>;

    /// Kill the whole subtree (SIGKILL).
    ///
    /// Once the child itself has exited only its leftovers are signalled.
    fn terminate_forcibly(&mut self) -> Result<()>;

    /// Whether processes started by an already exited child are still
    /// around. False while the child itself runs.
    fn has_leftovers(&self) -> bool {
        false
    }

    /// Wait until the OS confirms the child has been reclaimed
    async fn reap(&mut self) -> Result<ExitStatus>;

    /// Returns true once an exit has been observed
    fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }
}

/// Result of a non-blocking liveness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// The child has not exited yet
    Running,
    /// The child has exited
    Exited(ExitStatus),
}

impl PollStatus {
    /// Returns true if the child is still running
    pub fn is_running(&self) -> bool {
        matches!(self, PollStatus::Running)
    }
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Status of a process that exited normally with `code`
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Status of a process killed by `signal`
    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// The code a shell would report for this status.
    ///
    /// Death by signal `N` maps to `128 + N`; a status with neither a code
    /// nor a signal maps to 1.
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
            #[cfg(not(unix))]
            signal: None,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}
