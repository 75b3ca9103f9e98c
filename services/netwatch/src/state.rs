//! Shared state: per-host debounce state, internet state and the alert cache

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::Target;
use crate::hysteresis::{HostState, HysteresisPolicy, Transition};

/// Label used when the internet reachability check fails
pub const NO_INTERNET_LABEL: &str = "No internet connection available";

/// Label for an active host alert
pub fn host_alert_label(name: &str) -> String {
    format!("{} Disconnected.", name)
}

/// Global internet reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternetState {
    pub reachable: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Default for InternetState {
    /// Reachable until a check says otherwise
    fn default() -> Self {
        Self {
            reachable: true,
            last_checked_at: None,
        }
    }
}

/// One alert occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub label: String,
    pub occurred_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(label: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            occurred_at,
        }
    }
}

/// The externally readable alert snapshot, replaced wholesale on every sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertCache {
    pub records: Vec<AlertRecord>,
    /// `None` until the first sweep completes
    pub computed_at: Option<DateTime<Utc>>,
}

/// A monitored host and its debounce state
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub target: Target,
    pub state: HostState,
}

/// Raw result of probing one host during a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutcome {
    pub address: String,
    pub is_up: bool,
}

/// Alert edge for one host produced by a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTransition {
    pub name: String,
    pub address: String,
    pub transition: Transition,
}

/// What a sweep changed
#[derive(Debug, Clone)]
pub struct SweepApplied {
    pub transitions: Vec<HostTransition>,
    pub previous: AlertCache,
    pub current: AlertCache,
}

/// Per-host view returned by the status API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    pub name: String,
    pub address: String,
    /// `None` until the host has been probed
    pub up: Option<bool>,
    pub alert_active: bool,
    pub last_change_at: Option<DateTime<Utc>>,
    pub last_probe_at: Option<DateTime<Utc>>,
}

/// Consistent copy of everything the status API reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub internet: InternetState,
    pub hosts: Vec<HostStatus>,
}

/// Shared state accessible by the engine and the API
#[derive(Debug)]
pub struct SharedState {
    /// In target declaration order
    pub hosts: Vec<HostEntry>,
    pub internet: InternetState,
    pub alerts: AlertCache,
    pub sweeps_completed: u64,
    pub started_at: Instant,
}

impl SharedState {
    pub fn new(targets: Vec<Target>) -> Self {
        let hosts = targets
            .into_iter()
            .map(|target| HostEntry {
                target,
                state: HostState::default(),
            })
            .collect();

        Self {
            hosts,
            internet: InternetState::default(),
            alerts: AlertCache::default(),
            sweeps_completed: 0,
            started_at: Instant::now(),
        }
    }

    /// Look up a host's debounce state by address
    pub fn host_state(&self, address: &str) -> Option<&HostState> {
        self.hosts
            .iter()
            .find(|h| h.target.address == address)
            .map(|h| &h.state)
    }

    /// True if any host answered its most recent probe
    pub fn any_host_seen_up(&self) -> bool {
        self.hosts
            .iter()
            .any(|h| h.state.last_probe_result == Some(true))
    }

    /// Apply every outcome of one sweep at the shared instant `now`, then
    /// rebuild the alert cache from the fully updated state
    pub fn apply_sweep(
        &mut self,
        outcomes: &[HostOutcome],
        now: DateTime<Utc>,
        policy: &HysteresisPolicy,
    ) -> SweepApplied {
        let mut transitions = Vec::new();

        for outcome in outcomes {
            let Some(host) = self
                .hosts
                .iter_mut()
                .find(|h| h.target.address == outcome.address)
            else {
                tracing::debug!("Ignoring outcome for unknown host {}", outcome.address);
                continue;
            };

            let next = policy.apply_outcome(&host.state, outcome.is_up, now);
            let transition = Transition::between(&host.state, &next);
            host.state = next;

            if transition != Transition::None {
                transitions.push(HostTransition {
                    name: host.target.name.clone(),
                    address: host.target.address.clone(),
                    transition,
                });
            }
        }

        let current = self.recompute_alerts(now);
        let previous = std::mem::replace(&mut self.alerts, current.clone());
        self.sweeps_completed += 1;

        SweepApplied {
            transitions,
            previous,
            current,
        }
    }

    /// Record the result of an internet reachability check
    pub fn update_internet(&mut self, reachable: bool, now: DateTime<Utc>) {
        self.internet = InternetState {
            reachable,
            last_checked_at: Some(now),
        };
    }

    /// Build the alert list for the current state: the internet alert first,
    /// then active host alerts in declaration order
    pub fn recompute_alerts(&self, now: DateTime<Utc>) -> AlertCache {
        let mut records = Vec::new();

        if !self.internet.reachable {
            records.push(AlertRecord::new(NO_INTERNET_LABEL, now));
        }

        records.extend(
            self.hosts
                .iter()
                .filter(|h| h.state.alert_active)
                .map(|h| AlertRecord::new(host_alert_label(&h.target.name), now)),
        );

        AlertCache {
            records,
            computed_at: Some(now),
        }
    }

    /// Copy of the current alert cache
    pub fn alerts_snapshot(&self) -> AlertCache {
        self.alerts.clone()
    }

    /// Copy of the internet state and every host's status
    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            internet: self.internet,
            hosts: self
                .hosts
                .iter()
                .map(|h| HostStatus {
                    name: h.target.name.clone(),
                    address: h.target.address.clone(),
                    up: h.state.last_probe_result,
                    alert_active: h.state.alert_active,
                    last_change_at: h.state.last_change_at,
                    last_probe_at: h.state.last_probe_at,
                })
                .collect(),
        }
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<SharedState>>;

pub fn new_state_handle(targets: Vec<Target>) -> StateHandle {
    Arc::new(RwLock::new(SharedState::new(targets)))
}
