//! Real SIGINT / SIGTERM delivered to the supervising process
//!
//! Kept in its own test binary: the handlers installed here stay registered
//! for the rest of the process.

#![cfg(unix)]

use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid, getpid};
use runtogether_process::Command;
use runtogether_supervisor::{Supervisor, SupervisorConfig, SupervisorEventKind};
use std::time::Duration;

#[test]
fn test_sigint_and_sigterm_lead_to_a_single_shutdown_with_130() {
    smol::block_on(async {
        let config = SupervisorConfig::default()
            .with_grace_period(Duration::from_millis(500))
            .with_poll_interval(Duration::from_millis(20))
            .with_signal_handling(true);
        let mut supervisor = Supervisor::new(config);
        let events = supervisor.subscribe();

        std::thread::spawn(|| {
            std::thread::sleep(Duration::from_millis(500));
            signal::kill(getpid(), Signal::SIGINT).unwrap();
            signal::kill(getpid(), Signal::SIGTERM).unwrap();
        });

        let commands = vec![
            Command::from_argv(["sleep", "10"]).unwrap(),
            Command::from_argv(["sleep", "10"]).unwrap(),
        ];
        let code = supervisor.run(commands).await;
        assert_eq!(code, 130);

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind);
        }

        let pids: Vec<u32> = kinds
            .iter()
            .filter_map(|k| match k {
                SupervisorEventKind::Launched { pid, .. } => Some(*pid),
                _ => None,
            })
            .collect();
        assert_eq!(pids.len(), 2);
        for pid in pids {
            assert!(signal::kill(Pid::from_raw(pid as i32), None).is_err());
        }

        let completions = kinds
            .iter()
            .filter(|k| matches!(k, SupervisorEventKind::ShutdownComplete { .. }))
            .count();
        assert_eq!(completions, 1);
        assert!(
            kinds
                .iter()
                .any(|k| matches!(k, SupervisorEventKind::SignalReceived { .. }))
        );
    });
}
