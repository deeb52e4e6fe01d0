//! Child process primitives for runtogether
//!
//! This crate spawns commands into their own process group and knows how to
//! deliver graceful and forceful termination to the whole process subtree
//! rooted at a child, not just the direct child.

#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod launcher;
pub mod local;
pub mod process;
pub mod tree;

pub use command::Command;
pub use error::{Error, Result};
pub use launcher::Launcher;
pub use local::{LocalLauncher, LocalProcessHandle};
pub use process::{ExitStatus, PollStatus, ProcessHandle};
pub use tree::TerminationSignal;
