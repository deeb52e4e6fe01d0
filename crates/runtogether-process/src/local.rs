//! Local process backend

use async_process::Child;
use async_trait::async_trait;
use tracing::debug;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::launcher::Launcher;
use crate::process::{ExitStatus, PollStatus, ProcessHandle};
use crate::tree::TerminationSignal;

/// Launcher for executing processes locally, each in its own process group
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

/// A handle to control a local child and its descendants
pub struct LocalProcessHandle {
    /// The underlying child process
    child: Child,
    /// Cached pid; `Child::id` stays valid after reaping but we never re-ask
    pid: u32,
    /// First observed exit, never overwritten
    exit: Option<ExitStatus>,
}

impl LocalProcessHandle {
    /// Spawn `command` into a new process group
    pub fn spawn(command: &Command) -> Result<Self> {
        if command.get_program().is_empty() {
            return Err(Error::EmptyCommand);
        }

        let child = command
            .prepare()
            .spawn()
            .map_err(|e| Error::spawn_failed(command.describe(), &e))?;
        let pid = child.id();

        debug!("Spawned pid {} for '{}'", pid, command);

        Ok(Self {
            child,
            pid,
            exit: None,
        })
    }

    fn record_exit(&mut self, status: std::process::ExitStatus) -> ExitStatus {
        *self.exit.get_or_insert_with(|| ExitStatus::from(status))
    }

    fn signal(&mut self, signal: TerminationSignal) -> Result<()> {
        if self.exit.is_some() {
            // The pid is reaped; only the group it led can still be named.
            #[cfg(unix)]
            return crate::tree::signal_group(self.pid, signal);
            #[cfg(not(unix))]
            return Ok(());
        }

        #[cfg(unix)]
        {
            crate::tree::signal_tree(self.pid, signal)
        }

        #[cfg(not(unix))]
        {
            // No process groups or graceful signals here: both requests kill
            // the direct child.
            let _ = signal;
            match self.child.kill() {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
                Err(e) => Err(Error::signal_failed(self.pid, -1, e.to_string())),
            }
        }
    }
}

#[async_trait]
impl Launcher for LocalLauncher {
    type Handle = LocalProcessHandle;

    async fn launch(&self, command: &Command) -> Result<Self::Handle> {
        LocalProcessHandle::spawn(command)
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn poll(&mut self) -> Result<PollStatus> {
        if let Some(status) = self.exit {
            return Ok(PollStatus::Exited(status));
        }

        match self.child.try_status()? {
            Some(status) => Ok(PollStatus::Exited(self.record_exit(status))),
            None => Ok(PollStatus::Running),
        }
    }

    fn exit_status(&self) -> Option<&ExitStatus> {
        self.exit.as_ref()
    }

    fn has_leftovers(&self) -> bool {
        #[cfg(unix)]
        {
            self.exit.is_some() && crate::tree::group_exists(self.pid)
        }

        #[cfg(not(unix))]
        {
            false
        }
    }

    fn terminate_gracefully(&mut self) -> Result<()> {
        self.signal(TerminationSignal::Graceful)
    }

    fn terminate_forcibly(&mut self) -> Result<()> {
        self.signal(TerminationSignal::Forced)
    }

    async fn reap(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }

        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::reap_failed(self.pid, e.to_string()))?;

        Ok(self.record_exit(status))
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        if self.exit.is_none() {
            // Only when the supervisor never got to shut us down (a panic);
            // async-process reaps the child in the background afterwards.
            let _ = self.poll();
            let _ = self.terminate_forcibly();
        }
    }
}
