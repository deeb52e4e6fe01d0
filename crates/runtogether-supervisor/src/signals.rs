//! SIGINT / SIGTERM delivery to the supervisor
//!
//! `signal-hook` turns the async signals into an iterator consumed on a
//! plain thread, so the only thing that happens in response to a signal is
//! a [`ShutdownTrigger::fire`]. The shutdown work itself stays on the
//! supervisor's driver.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::thread::{self, JoinHandle};
use tracing::debug;

use crate::shutdown::{ShutdownReason, ShutdownTrigger};

/// Forwards termination signals to a [`ShutdownTrigger`] until dropped
pub struct SignalListener {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalListener {
    /// Register for SIGINT and SIGTERM and start the forwarding thread
    pub fn install(trigger: ShutdownTrigger) -> std::io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("runtogether-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    if trigger.fire(ShutdownReason::Signal { signal }) {
                        debug!("Signal {} requested shutdown", signal);
                    } else {
                        debug!("Signal {} ignored, shutdown already in progress", signal);
                    }
                }
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
