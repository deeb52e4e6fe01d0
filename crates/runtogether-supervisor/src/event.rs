//! Supervisor progress events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observable step of a supervisor run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: SupervisorEventKind,
}

impl SupervisorEvent {
    /// Create a new event stamped with the current time
    pub fn new(kind: SupervisorEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Types of supervisor events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEventKind {
    /// A child was spawned
    Launched {
        /// Child pid
        pid: u32,
        /// Command as written
        command: String,
    },
    /// A command could not be spawned
    LaunchFailed {
        /// Command as written
        command: String,
        /// Why it failed
        reason: String,
    },
    /// A child was observed to have exited on its own
    ChildExited {
        /// Child pid
        pid: u32,
        /// Command as written
        command: String,
        /// Recorded exit code
        code: i32,
    },
    /// The supervisor was interrupted by a signal
    SignalReceived {
        /// Raw signal number
        signal: i32,
    },
    /// Graceful termination is being requested from every live child
    ShutdownStarted {
        /// The exit code that will be reported
        exit_code: i32,
    },
    /// Something outlived the graceful request; after the grace period
    /// whatever is left is killed
    ForceKilling {
        /// Pids (or process groups of exited children) still alive after
        /// the grace period; empty if everything went away in time
        pids: Vec<u32>,
    },
    /// A killed child could not be confirmed reclaimed
    ReapFailed {
        /// Child pid
        pid: u32,
        /// Why reaping failed
        reason: String,
    },
    /// Shutdown finished
    ShutdownComplete {
        /// The exit code being reported
        exit_code: i32,
    },
}
