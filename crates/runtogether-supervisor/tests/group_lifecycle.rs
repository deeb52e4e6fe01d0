//! End-to-end supervision of real child processes

#![cfg(unix)]

use runtogether_process::Command;
use runtogether_supervisor::{
    ShutdownReason, Supervisor, SupervisorConfig, SupervisorEvent, SupervisorEventKind,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use nix::sys::signal;
use nix::unistd::Pid;

fn cmd(line: &str) -> Command {
    let mut command = Command::from_argv(["sh", "-c", line]).unwrap();
    command.label(line);
    command
}

fn argv(parts: &[&str]) -> Command {
    Command::from_argv(parts).unwrap()
}

fn config() -> SupervisorConfig {
    SupervisorConfig::default()
        .with_grace_period(Duration::from_millis(500))
        .with_poll_interval(Duration::from_millis(20))
        .with_signal_handling(false)
}

fn drain(rx: &async_channel::Receiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn launched_pids(events: &[SupervisorEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            SupervisorEventKind::Launched { pid, .. } => Some(*pid),
            _ => None,
        })
        .collect()
}

fn is_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map(|state| state != "Z" && state != "X")
            .unwrap_or(true),
        Err(_) => !cfg!(target_os = "linux"),
    }
}

#[test]
fn test_first_exit_code_wins_and_siblings_are_terminated() {
    smol::block_on(async {
        let mut supervisor = Supervisor::new(config());
        let events = supervisor.subscribe();

        let code = supervisor.run(vec![argv(&["sleep", "10"]), argv(&["false"])]).await;
        assert_eq!(code, 1);

        let events = drain(&events);
        let pids = launched_pids(&events);
        assert_eq!(pids.len(), 2);

        assert!(events.iter().any(|e| matches!(
            &e.kind,
            SupervisorEventKind::ChildExited { pid, command, code: 1 }
                if *pid == pids[1] && command == "false"
        )));
        assert!(!is_alive(pids[0]), "sleep should have been terminated");
    });
}

#[test]
fn test_child_exit_code_is_propagated() {
    smol::block_on(async {
        let mut supervisor = Supervisor::new(config());
        let code = supervisor
            .run(vec![cmd("sleep 10"), cmd("sleep 0.2; exit 42")])
            .await;
        assert_eq!(code, 42);
    });
}

#[test]
fn test_external_shutdown_request_records_130() {
    smol::block_on(async {
        let mut supervisor = Supervisor::new(config());
        let events = supervisor.subscribe();
        let trigger = supervisor.shutdown_trigger();

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            trigger.fire(ShutdownReason::Signal { signal: 2 });
        });

        let code = supervisor
            .run(vec![argv(&["sleep", "10"]), argv(&["sleep", "10"])])
            .await;
        assert_eq!(code, 130);

        let events = drain(&events);
        for pid in launched_pids(&events) {
            assert!(!is_alive(pid));
        }
        // sleep dies on SIGTERM, so the forced phase finds nobody to kill.
        for event in &events {
            if let SupervisorEventKind::ForceKilling { pids } = &event.kind {
                assert!(pids.is_empty(), "unexpected forced kill of {:?}", pids);
            }
        }
    });
}

#[test]
fn test_invalid_executable_shuts_down_siblings_without_hanging() {
    smol::block_on(async {
        let started = Instant::now();
        let mut supervisor = Supervisor::new(config());
        let events = supervisor.subscribe();

        let code = supervisor
            .run(vec![
                argv(&["sleep", "10"]),
                argv(&["/no/such/executable"]),
                argv(&["sleep", "10"]),
            ])
            .await;

        assert_eq!(code, 1);
        assert!(started.elapsed() < Duration::from_secs(5));

        let events = drain(&events);
        let pids = launched_pids(&events);
        assert_eq!(pids.len(), 1, "nothing launches after a failed spawn");
        assert!(!is_alive(pids[0]));
        assert!(
            events
                .iter()
                .any(|e| matches!(e.kind, SupervisorEventKind::LaunchFailed { .. }))
        );
    });
}

#[test]
fn test_grace_period_is_respected_for_stubborn_children() {
    smol::block_on(async {
        let grace = Duration::from_millis(500);
        let mut supervisor = Supervisor::new(config().with_grace_period(grace));
        let events = supervisor.subscribe();

        let code = supervisor
            .run(vec![
                cmd("trap '' TERM; while true; do sleep 1; done"),
                cmd("sleep 0.3; exit 5"),
            ])
            .await;
        assert_eq!(code, 5);

        let events = drain(&events);
        let started = events
            .iter()
            .find(|e| matches!(e.kind, SupervisorEventKind::ShutdownStarted { .. }))
            .expect("shutdown started")
            .timestamp;
        let forced = events
            .iter()
            .find(|e| matches!(e.kind, SupervisorEventKind::ForceKilling { .. }))
            .expect("stubborn child should need a forced kill")
            .timestamp;

        let waited = (forced - started).to_std().unwrap();
        assert!(waited >= grace, "forced kill came after only {:?}", waited);
        assert!(waited < grace + Duration::from_millis(500));

        for pid in launched_pids(&events) {
            assert!(!is_alive(pid));
        }
    });
}

#[test]
fn test_descendants_are_cleaned_up() {
    smol::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("descendant.pid");
        let wrapper = format!("sleep 100 & echo $! > {}; wait", pid_file.display());

        let mut supervisor = Supervisor::new(config());
        let code = supervisor
            .run(vec![cmd(&wrapper), cmd("sleep 0.5; exit 3")])
            .await;
        assert_eq!(code, 3);

        let descendant: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while is_alive(descendant) && Instant::now() < deadline {
            smol::Timer::after(Duration::from_millis(20)).await;
        }
        assert!(!is_alive(descendant), "descendant {} survived", descendant);
    });
}

#[test]
fn test_descendants_of_the_exiting_child_are_cleaned_up() {
    smol::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("orphan.pid");
        let trigger = format!(
            "sleep 100 & echo $! > {}; sleep 0.3; exit 3",
            pid_file.display()
        );

        let mut supervisor = Supervisor::new(config());
        let code = supervisor
            .run(vec![argv(&["sleep", "10"]), cmd(&trigger)])
            .await;
        assert_eq!(code, 3);

        let orphan: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while is_alive(orphan) && Instant::now() < deadline {
            smol::Timer::after(Duration::from_millis(20)).await;
        }
        assert!(!is_alive(orphan), "{} outlived the child that started it", orphan);
    });
}

#[test]
fn test_shutdown_messages_happen_once_and_callback_runs() {
    smol::block_on(async {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut supervisor = Supervisor::new(config()).on_complete(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let events = supervisor.subscribe();
        let trigger = supervisor.shutdown_trigger();

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            trigger.fire(ShutdownReason::Signal { signal: 2 });
            trigger.fire(ShutdownReason::Signal { signal: 15 });
        });

        let code = supervisor.run(vec![argv(&["sleep", "10"])]).await;
        assert_eq!(code, 130);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let events = drain(&events);
        let count = |f: fn(&SupervisorEventKind) -> bool| events.iter().filter(|e| f(&e.kind)).count();
        assert_eq!(count(|k| matches!(k, SupervisorEventKind::ShutdownStarted { .. })), 1);
        assert_eq!(count(|k| matches!(k, SupervisorEventKind::ShutdownComplete { .. })), 1);
    });
}

#[smol_potat::test]
async fn test_children_exiting_in_the_same_scan_report_launch_order() {
    // Both exit between the first and the second scan, so the second scan
    // sees them together and launch order decides.
    let mut supervisor = Supervisor::new(config().with_poll_interval(Duration::from_millis(300)));
    let code = supervisor
        .run(vec![cmd("sleep 0.1; exit 21"), cmd("sleep 0.1; exit 22")])
        .await;
    assert_eq!(code, 21);
}
