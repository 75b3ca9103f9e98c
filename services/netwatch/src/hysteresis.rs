//! Per-host debounce state machine
//!
//! Raw up/down probe outcomes are folded into [`HostState`] by
//! [`HysteresisPolicy::apply_outcome`]. An alert is raised after
//! `raise_after_failures` consecutive failures and cleared only after
//! `clear_after_successes` consecutive successes once it has been held for at
//! least `min_hold`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::HysteresisConfig;

/// Debounce state for one host
///
/// At most one of the two run-length counters is non-zero, and an active
/// alert always carries `last_change_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostState {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub alert_active: bool,
    pub last_change_at: Option<DateTime<Utc>>,
    pub last_probe_result: Option<bool>,
    pub last_probe_at: Option<DateTime<Utc>>,
}

/// Alert edge produced by one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Raised,
    Cleared,
}

impl Transition {
    /// Classify the edge between two states of the same host
    pub fn between(before: &HostState, after: &HostState) -> Self {
        match (before.alert_active, after.alert_active) {
            (false, true) => Transition::Raised,
            (true, false) => Transition::Cleared,
            _ => Transition::None,
        }
    }
}

/// Raise/clear thresholds and minimum hold time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisPolicy {
    pub raise_after_failures: u32,
    pub clear_after_successes: u32,
    pub min_hold: Duration,
}

impl Default for HysteresisPolicy {
    fn default() -> Self {
        Self::from(&HysteresisConfig::default())
    }
}

impl From<&HysteresisConfig> for HysteresisPolicy {
    fn from(config: &HysteresisConfig) -> Self {
        Self {
            raise_after_failures: config.raise_after_failures,
            clear_after_successes: config.clear_after_successes,
            min_hold: config.min_hold,
        }
    }
}

impl HysteresisPolicy {
    /// Fold one probe outcome observed at `now` into `state`
    pub fn apply_outcome(&self, state: &HostState, is_up: bool, now: DateTime<Utc>) -> HostState {
        let mut next = *state;
        next.last_probe_result = Some(is_up);
        next.last_probe_at = Some(now);

        if is_up {
            next.consecutive_successes = next.consecutive_successes.saturating_add(1);
            next.consecutive_failures = 0;

            if next.alert_active
                && next.consecutive_successes >= self.clear_after_successes
                && self.held_long_enough(next.last_change_at, now)
            {
                next.alert_active = false;
                next.last_change_at = Some(now);
            }
        } else {
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            next.consecutive_successes = 0;

            if !next.alert_active && next.consecutive_failures >= self.raise_after_failures {
                next.alert_active = true;
                next.last_change_at = Some(now);
            }
        }

        next
    }

    fn held_long_enough(&self, last_change_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_change_at {
            None => true,
            // A clock that stepped backwards yields a negative span: not held
            Some(changed) => (now - changed)
                .to_std()
                .map(|held| held >= self.min_hold)
                .unwrap_or(false),
        }
    }
}
