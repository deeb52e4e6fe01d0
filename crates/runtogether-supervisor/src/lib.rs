//! # runtogether supervisor
//!
//! Launches a group of commands, watches them, and tears the whole group
//! down as soon as any one of them exits or the supervisor itself is asked
//! to stop (SIGINT / SIGTERM).
//!
//! ```no_run
//! use runtogether_process::Command;
//! use runtogether_supervisor::{Supervisor, SupervisorConfig};
//!
//! let commands = vec![
//!     Command::from_argv(["sleep", "10"]).unwrap(),
//!     Command::from_argv(["false"]).unwrap(),
//! ];
//! let mut supervisor = Supervisor::new(SupervisorConfig::default());
//! let code = smol::block_on(supervisor.run(commands));
//! std::process::exit(code);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod event;
pub mod shutdown;
#[cfg(unix)]
pub mod signals;
pub mod supervisor;

pub use config::{ExitPolicy, SupervisorConfig};
pub use event::{SupervisorEvent, SupervisorEventKind};
pub use shutdown::{ShutdownReason, ShutdownTrigger, LAUNCH_FAILURE_EXIT_CODE, SIGNAL_EXIT_CODE};
pub use supervisor::{CompletionCallback, Supervisor, SupervisorState};
