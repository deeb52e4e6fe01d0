//! The supervision state machine
//!
//! `Idle -> Launching -> Monitoring -> ShuttingDown -> Terminated`
//!
//! A run launches every command, polls all children round-robin at a fixed
//! interval, and on the first trigger (child exit, failed launch, SIGINT /
//! SIGTERM) terminates the rest: SIGTERM to every live subtree, up to one
//! grace period for them to go, SIGKILL and reap for whatever is left.

use async_channel::{Receiver, Sender};
use futures_lite::future;
use runtogether_process::{Command, Launcher, LocalLauncher, PollStatus, ProcessHandle};
use smol::Timer;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::event::{SupervisorEvent, SupervisorEventKind};
use crate::shutdown::{ShutdownReason, ShutdownTrigger};

/// Zero-argument hook run once shutdown has completed
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of a supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Created, nothing launched yet
    Idle,
    /// Spawning the commands
    Launching,
    /// Polling the children
    Monitoring,
    /// Terminating the children
    ShuttingDown,
    /// Done; the recorded exit code has been returned
    Terminated,
}

struct Supervised<H> {
    handle: H,
    command: String,
}

impl<H: ProcessHandle> Supervised<H> {
    /// Fresh check whether anything of this child's subtree is still up:
    /// the child itself, or what it left behind in its process group. An
    /// unanswerable poll counts as running so the child is not skipped by
    /// the termination steps.
    fn needs_stopping(&mut self) -> bool {
        match self.handle.poll() {
            Ok(PollStatus::Running) => true,
            Ok(PollStatus::Exited(_)) => self.handle.has_leftovers(),
            Err(err) => {
                warn!("Failed to poll pid {}: {}", self.handle.pid(), err);
                true
            }
        }
    }
}

/// Launches a group of commands and keeps them alive together
pub struct Supervisor<L: Launcher = LocalLauncher> {
    launcher: L,
    config: SupervisorConfig,
    /// Launch order; append-only until shutdown
    children: Vec<Supervised<L::Handle>>,
    trigger: ShutdownTrigger,
    state: SupervisorState,
    events: Option<Sender<SupervisorEvent>>,
    on_complete: Option<CompletionCallback>,
}

impl Supervisor<LocalLauncher> {
    /// Create a supervisor that runs commands as local processes
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_launcher(LocalLauncher, config)
    }
}

impl<L: Launcher> Supervisor<L> {
    /// Create a supervisor on top of a custom launcher
    pub fn with_launcher(launcher: L, config: SupervisorConfig) -> Self {
        Self {
            launcher,
            config,
            children: Vec::new(),
            trigger: ShutdownTrigger::new(),
            state: SupervisorState::Idle,
            events: None,
            on_complete: None,
        }
    }

    /// Run `callback` once shutdown completes, just before `run` returns
    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Receive every [`SupervisorEvent`] of the run
    pub fn subscribe(&mut self) -> Receiver<SupervisorEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.events = Some(tx);
        rx
    }

    /// Handle for requesting shutdown from outside the run
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Pids of the launched children, in launch order
    pub fn pids(&self) -> Vec<u32> {
        self.children.iter().map(|c| c.handle.pid()).collect()
    }

    /// Launch `commands`, supervise them and shut the group down.
    ///
    /// Returns the recorded exit code: the first exited child's code, 130
    /// for SIGINT / SIGTERM, or 1 for a failed launch. Terminating the
    /// calling process with that code is left to the caller.
    pub async fn run(&mut self, commands: impl IntoIterator<Item = Command>) -> i32 {
        if self.state != SupervisorState::Idle {
            warn!("Supervisor has already run; ignoring");
            return self.trigger.reason().map(|r| r.exit_code()).unwrap_or(0);
        }

        #[cfg(unix)]
        let _signals = self.listen_for_signals();

        self.state = SupervisorState::Launching;
        self.launch_all(commands).await;

        self.state = SupervisorState::Monitoring;
        self.monitor().await;

        self.state = SupervisorState::ShuttingDown;
        let exit_code = self.shut_down().await;

        self.state = SupervisorState::Terminated;
        exit_code
    }

    #[cfg(unix)]
    fn listen_for_signals(&self) -> Option<crate::signals::SignalListener> {
        if !self.config.handle_signals {
            return None;
        }
        match crate::signals::SignalListener::install(self.trigger.clone()) {
            Ok(listener) => Some(listener),
            Err(err) => {
                warn!("Could not install signal handlers: {}", err);
                None
            }
        }
    }

    fn emit(&self, kind: SupervisorEventKind) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(SupervisorEvent::new(kind));
        }
    }

    async fn launch_all(&mut self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            let description = command.describe();
            if self.trigger.is_fired() {
                debug!("Shutdown requested, not launching '{}'", description);
                break;
            }

            match self.launcher.launch(&command).await {
                Ok(handle) => {
                    let pid = handle.pid();
                    info!("Launched child with pid {}: {}", pid, description);
                    self.emit(SupervisorEventKind::Launched {
                        pid,
                        command: description.clone(),
                    });
                    self.children.push(Supervised {
                        handle,
                        command: description,
                    });
                }
                Err(err) => {
                    error!("Failed to launch '{}': {:?}", description, err);
                    self.emit(SupervisorEventKind::LaunchFailed {
                        command: description.clone(),
                        reason: err.to_string(),
                    });
                    self.trigger.fire(ShutdownReason::LaunchFailed {
                        command: description,
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }

        if self.children.is_empty() {
            self.trigger.fire(ShutdownReason::NothingToRun);
        }
    }

    async fn monitor(&mut self) {
        let interval = self.config.poll_interval;
        while !self.trigger.is_fired() {
            self.scan();
            if self.trigger.is_fired() {
                break;
            }
            future::or(
                async {
                    Timer::after(interval).await;
                },
                self.trigger.wait(),
            )
            .await;
        }
    }

    /// One round-robin pass in launch order. The first exit that the
    /// policy counts fires the trigger and ends the pass.
    fn scan(&mut self) {
        for index in 0..self.children.len() {
            let child = &mut self.children[index];
            if child.handle.has_exited() {
                continue;
            }

            let pid = child.handle.pid();
            let status = match child.handle.poll() {
                Ok(PollStatus::Running) => continue,
                Ok(PollStatus::Exited(status)) => status,
                Err(err) => {
                    error!("Failed to poll pid {}: {}", pid, err);
                    self.trigger.fire(ShutdownReason::PollFailed {
                        pid,
                        reason: err.to_string(),
                    });
                    return;
                }
            };

            let code = status.exit_code();
            let command = child.command.clone();
            info!("Child with pid {} terminated with exit code {}!", pid, code);
            self.emit(SupervisorEventKind::ChildExited {
                pid,
                command: command.clone(),
                code,
            });

            if self.config.exit_policy.triggers_on(code) {
                // Losing to a signal that raced us is fine: its code stands.
                self.trigger
                    .fire(ShutdownReason::ChildExited { pid, command, code });
                return;
            }
        }

        if self.children.iter().all(|c| c.handle.has_exited()) {
            info!("All children exited cleanly");
            self.trigger.fire(ShutdownReason::AllExitedCleanly);
        }
    }

    fn running_pids(&mut self) -> Vec<u32> {
        self.children
            .iter_mut()
            .filter_map(|c| c.needs_stopping().then(|| c.handle.pid()))
            .collect()
    }

    /// Wait up to `limit` for every child to exit, checking at the poll
    /// interval. Returns early once nothing is running. A limit too far in
    /// the future to represent means no deadline.
    async fn wait_for_exit(&mut self, limit: Duration) {
        let deadline = Instant::now().checked_add(limit);
        loop {
            if self.running_pids().is_empty() {
                return;
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return;
                    }
                    self.config.poll_interval.min(deadline - now)
                }
                None => self.config.poll_interval,
            };
            Timer::after(pause).await;
        }
    }

    async fn shut_down(&mut self) -> i32 {
        let reason = self
            .trigger
            .reason()
            .unwrap_or(ShutdownReason::NothingToRun);
        let exit_code = reason.exit_code();

        if let ShutdownReason::Signal { signal } = reason {
            info!("Received signal {}", signal);
            self.emit(SupervisorEventKind::SignalReceived { signal });
        }

        info!("Asking all child processes to terminate...");
        self.emit(SupervisorEventKind::ShutdownStarted { exit_code });

        for child in &mut self.children {
            if !child.needs_stopping() {
                continue;
            }
            if let Err(err) = child.handle.terminate_gracefully() {
                warn!(
                    "Failed to ask pid {} ({}) to terminate: {}",
                    child.handle.pid(),
                    child.command,
                    err
                );
            }
        }

        // The forced phase is entered whenever anything outlived the
        // graceful pass, even if it goes away during the grace period.
        if !self.running_pids().is_empty() {
            self.wait_for_exit(self.config.grace_period).await;

            let survivors = self.running_pids();
            info!("Killing remaining child processes...");
            self.emit(SupervisorEventKind::ForceKilling { pids: survivors });
            self.kill_survivors().await;
        }

        info!("done.");
        self.emit(SupervisorEventKind::ShutdownComplete { exit_code });

        if let Some(callback) = self.on_complete.take() {
            callback();
        }

        exit_code
    }

    async fn kill_survivors(&mut self) {
        let mut failures = Vec::new();
        for child in &mut self.children {
            if !child.needs_stopping() {
                continue;
            }
            let pid = child.handle.pid();
            if let Err(err) = child.handle.terminate_forcibly() {
                warn!("Failed to kill pid {} ({}): {}", pid, child.command, err);
            }
            if let Err(err) = child.handle.reap().await {
                error!("Could not confirm pid {} was reclaimed: {}", pid, err);
                failures.push((pid, err.to_string()));
            }
        }
        for (pid, reason) in failures {
            self.emit(SupervisorEventKind::ReapFailed { pid, reason });
        }
    }
}
