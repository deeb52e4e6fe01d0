//! Supervisor tuning knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time between the graceful and the forced termination request
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Default time between two liveness scans
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Which child exits bring the whole group down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Any exit, whatever its code
    #[default]
    #[serde(alias = "any-exit")]
    Any,
    /// Only exits with a non-zero code; clean exits are just recorded
    #[serde(alias = "nonzero")]
    NonZero,
}

impl ExitPolicy {
    /// Whether a child exiting with `code` starts the shutdown
    pub fn triggers_on(self, code: i32) -> bool {
        match self {
            ExitPolicy::Any => true,
            ExitPolicy::NonZero => code != 0,
        }
    }
}

impl std::str::FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" | "any-exit" => Ok(ExitPolicy::Any),
            "non-zero" | "nonzero" => Ok(ExitPolicy::NonZero),
            other => Err(format!(
                "unknown exit policy '{}', expected 'any' or 'non-zero'",
                other
            )),
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long survivors get between SIGTERM and SIGKILL
    pub grace_period: Duration,
    /// Pause between two scans of the children
    pub poll_interval: Duration,
    /// Which exits trigger the shutdown
    pub exit_policy: ExitPolicy,
    /// Install SIGINT / SIGTERM handlers for the duration of a run
    pub handle_signals: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            exit_policy: ExitPolicy::default(),
            handle_signals: true,
        }
    }
}

impl SupervisorConfig {
    /// Set the grace period
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the exit policy
    pub fn with_exit_policy(mut self, exit_policy: ExitPolicy) -> Self {
        self.exit_policy = exit_policy;
        self
    }

    /// Enable or disable signal handling
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SupervisorConfig::default();
        assert_eq!(config.grace_period, Duration::from_secs(3));
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.exit_policy, ExitPolicy::Any);
        assert!(config.handle_signals);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("any".parse::<ExitPolicy>().unwrap(), ExitPolicy::Any);
        assert_eq!("non-zero".parse::<ExitPolicy>().unwrap(), ExitPolicy::NonZero);
        assert!("sometimes".parse::<ExitPolicy>().is_err());
    }

    #[test]
    fn non_zero_policy_ignores_clean_exits() {
        assert!(ExitPolicy::Any.triggers_on(0));
        assert!(!ExitPolicy::NonZero.triggers_on(0));
        assert!(ExitPolicy::NonZero.triggers_on(143));
    }
}
