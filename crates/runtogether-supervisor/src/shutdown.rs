//! The one-shot shutdown latch shared by every trigger source
//!
//! The monitoring loop, a failed launch and the signal thread all race to
//! request shutdown. Whoever fires the [`ShutdownTrigger`] first decides the
//! [`ShutdownReason`] (and so the exit code); every later request is a
//! silent no-op. The shutdown sequence itself only ever runs on the
//! supervisor's driver, after it observes the latch.

use async_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Exit code recorded when the supervisor itself is interrupted
pub const SIGNAL_EXIT_CODE: i32 = 130;

/// Exit code recorded when a command could not be launched
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 1;

/// Why the group is being shut down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum ShutdownReason {
    /// A child exited; its code becomes ours
    ChildExited {
        /// Child pid
        pid: u32,
        /// Command as written
        command: String,
        /// The child's exit code
        code: i32,
    },
    /// SIGINT or SIGTERM was delivered to the supervisor
    Signal {
        /// Raw signal number
        signal: i32,
    },
    /// A command could not be launched
    LaunchFailed {
        /// Command as written
        command: String,
        /// Why the launch failed
        reason: String,
    },
    /// The liveness of a child could not be determined
    PollFailed {
        /// Child pid
        pid: u32,
        /// Why polling failed
        reason: String,
    },
    /// Every child exited with code 0 under the non-zero exit policy
    AllExitedCleanly,
    /// There was nothing to launch
    NothingToRun,
}

impl ShutdownReason {
    /// The exit code this reason records
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::ChildExited { code, .. } => *code,
            ShutdownReason::Signal { .. } => SIGNAL_EXIT_CODE,
            ShutdownReason::LaunchFailed { .. } | ShutdownReason::PollFailed { .. } => {
                LAUNCH_FAILURE_EXIT_CODE
            }
            ShutdownReason::AllExitedCleanly | ShutdownReason::NothingToRun => 0,
        }
    }
}

struct TriggerInner {
    fired: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

/// Cloneable handle used to request that shutdown begin
#[derive(Clone)]
pub struct ShutdownTrigger {
    inner: Arc<TriggerInner>,
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTrigger {
    /// Create an unfired trigger
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = async_channel::bounded(1);
        Self {
            inner: Arc::new(TriggerInner {
                fired: AtomicBool::new(false),
                reason: Mutex::new(None),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Request shutdown for `reason`.
    ///
    /// Returns true if this call won; false if shutdown had already been
    /// requested, in which case `reason` is dropped.
    pub fn fire(&self, reason: ShutdownReason) -> bool {
        {
            let mut slot = self
                .inner
                .reason
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
            self.inner.fired.store(true, Ordering::SeqCst);
        }
        // Capacity 1 and a single winner: this never finds the channel full.
        let _ = self.inner.wake_tx.try_send(());
        true
    }

    /// Whether shutdown has been requested
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// The reason recorded by the winning request
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        if self.is_fired() {
            return;
        }
        let _ = self.inner.wake_rx.recv().await;
    }
}

impl std::fmt::Debug for ShutdownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownTrigger")
            .field("fired", &self.is_fired())
            .field("reason", &self.reason())
            .finish()
    }
}
