//! Process subtree discovery and signalling
//!
//! Children are started as leaders of their own process group, so one
//! `killpg` reaches everything that stayed in the group. Descendants that
//! moved to another group (or session) are found by walking the process
//! table by parent pid and are signalled one by one, leaves first.
//!
//! The tree can change between discovery and delivery. Processes that are
//! already gone are skipped silently.

use std::collections::{HashMap, HashSet};

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Which termination request to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// A request the target may intercept (SIGTERM)
    Graceful,
    /// A request the target cannot intercept (SIGKILL)
    Forced,
}

#[cfg(unix)]
impl TerminationSignal {
    fn as_nix(self) -> nix::sys::signal::Signal {
        match self {
            TerminationSignal::Graceful => nix::sys::signal::Signal::SIGTERM,
            TerminationSignal::Forced => nix::sys::signal::Signal::SIGKILL,
        }
    }

    /// Raw signal number
    pub fn number(self) -> i32 {
        self.as_nix() as i32
    }
}

/// Recursively find all descendant PIDs of `root`, deepest first.
///
/// The returned order is post-order: every process appears before its
/// parent, so signalling in order hits leaves before the processes that
/// could respawn them. `root` itself is not included.
pub fn find_all_descendants(root: u32) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, process) in sys.processes() {
        // Threads show up as tasks on Linux; they die with their process.
        if process.thread_kind().is_some() {
            continue;
        }
        if let Some(parent) = process.parent() {
            children
                .entry(parent.as_u32())
                .or_default()
                .push(pid.as_u32());
        }
    }

    let mut ordered = Vec::new();
    let mut seen = HashSet::from([root]);
    collect_post_order(root, &children, &mut seen, &mut ordered);
    ordered
}

fn collect_post_order(
    pid: u32,
    children: &HashMap<u32, Vec<u32>>,
    seen: &mut HashSet<u32>,
    out: &mut Vec<u32>,
) {
    let Some(kids) = children.get(&pid) else {
        return;
    };
    for &child in kids {
        if seen.insert(child) {
            collect_post_order(child, children, seen, out);
            out.push(child);
        }
    }
}

/// Deliver `signal` to the process group led by `root` and to every
/// descendant of `root`, then to `root` itself.
///
/// Only a failure to signal `root` for a reason other than "no such
/// process" is returned; failures on descendants are logged.
#[cfg(unix)]
pub fn signal_tree(root: u32, signal: TerminationSignal) -> Result<()> {
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid;

    // Discover first: once the root dies its children get reparented and
    // can no longer be found by walking from it.
    let descendants = find_all_descendants(root);
    let sig = signal.as_nix();
    debug!(
        "Sending {:?} to pid {} and {} descendant(s)",
        sig,
        root,
        descendants.len()
    );

    let root_pid = Pid::from_raw(root as i32);
    if let Err(e) = killpg(root_pid, sig) {
        let err = Error::from(e);
        if !err.is_process_gone() {
            debug!("killpg({}) failed: {}", root, err);
        }
    }

    for pid in descendants {
        if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
            let err = Error::from(e);
            if !err.is_process_gone() {
                warn!("Failed to send {:?} to descendant {}: {}", sig, pid, err);
            }
        }
    }

    match kill(root_pid, sig) {
        Ok(()) => Ok(()),
        Err(e) => {
            let err = Error::from(e);
            if err.is_process_gone() {
                Ok(())
            } else {
                Err(Error::signal_failed(root, signal.number(), err.to_string()))
            }
        }
    }
}

/// Deliver `signal` to every process left in the group `pgid`.
///
/// Used once the group leader has exited and been reaped: the pid is not
/// handed out again while the group still has members, so the group id
/// keeps naming what the leader left behind.
#[cfg(unix)]
pub fn signal_group(pgid: u32, signal: TerminationSignal) -> Result<()> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), signal.as_nix()) {
        Ok(()) => {
            debug!("Sent {:?} to leftovers of group {}", signal.as_nix(), pgid);
            Ok(())
        }
        Err(e) => {
            let err = Error::from(e);
            if err.is_process_gone() {
                Ok(())
            } else {
                Err(Error::signal_failed(pgid, signal.number(), err.to_string()))
            }
        }
    }
}

/// Whether any process we may signal still belongs to the group `pgid`
#[cfg(unix)]
pub fn group_exists(pgid: u32) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pgid as i32), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_order_lists_leaves_before_parents() {
        let children = HashMap::from([(1, vec![2, 3]), (2, vec![4]), (4, vec![5])]);
        let mut seen = HashSet::from([1]);
        let mut out = Vec::new();
        collect_post_order(1, &children, &mut seen, &mut out);
        assert_eq!(out, vec![5, 4, 2, 3]);
    }

    #[test]
    fn post_order_survives_cycles() {
        // A corrupt snapshot must not recurse forever.
        let children = HashMap::from([(1, vec![2]), (2, vec![1])]);
        let mut seen = HashSet::from([1]);
        let mut out = Vec::new();
        collect_post_order(1, &children, &mut seen, &mut out);
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn unknown_root_has_no_descendants() {
        assert!(find_all_descendants(u32::MAX - 1).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn signalling_a_missing_process_is_not_an_error() {
        assert!(signal_tree(u32::MAX / 2, TerminationSignal::Graceful).is_ok());
        assert!(signal_group(u32::MAX / 2, TerminationSignal::Forced).is_ok());
        assert!(!group_exists(u32::MAX / 2));
    }
}
