//! BDD test world for netwatch service

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cucumber::World;
use tokio_util::sync::CancellationToken;

use netwatch::config::{Config, Target};
use netwatch::engine::MonitorEngine;
use netwatch::history::MemoryAlertLog;
use netwatch::probe::{ConnectProber, EchoProber, ProbeOutcome};
use netwatch::state::{new_state_handle, SweepApplied};

/// Echo prober answering from a table of per-address results. Addresses
/// not in the table answer.
#[derive(Debug, Default)]
pub struct HostTable {
    pub up: Mutex<HashMap<String, bool>>,
}

impl HostTable {
    pub fn set(&self, address: &str, up: bool) {
        self.up.lock().unwrap().insert(address.to_string(), up);
    }
}

#[async_trait]
impl EchoProber for HostTable {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let up = self.up.lock().unwrap().get(address).copied().unwrap_or(true);
        if up {
            ProbeOutcome::Reachable
        } else {
            ProbeOutcome::TimedOut
        }
    }
}

/// Connect prober whose targets are all up or all down
#[derive(Debug)]
pub struct InternetSwitch {
    pub up: AtomicBool,
}

impl Default for InternetSwitch {
    fn default() -> Self {
        Self {
            up: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ConnectProber for InternetSwitch {
    async fn connect(&self, _target: SocketAddr, _timeout: Duration) -> ProbeOutcome {
        if self.up.load(Ordering::SeqCst) {
            ProbeOutcome::Reachable
        } else {
            ProbeOutcome::Unreachable("connection refused".to_string())
        }
    }
}

#[derive(Debug, Default, World)]
pub struct NetwatchWorld {
    pub config: Config,
    pub targets_declared: bool,
    pub hosts: Arc<HostTable>,
    pub internet: Arc<InternetSwitch>,
    pub log: Arc<MemoryAlertLog>,
    pub engine: Option<MonitorEngine>,

    /// Simulated clock, seconds since the start of the scenario
    pub clock: i64,
    pub last_sweep: Option<SweepApplied>,

    // API testing
    pub response_status: Option<u16>,
    pub response_json: Option<serde_json::Value>,

    // Lifecycle testing
    pub lifecycle_cancel: Option<CancellationToken>,
    pub lifecycle_build_succeeded: Option<bool>,
    pub lifecycle_start_succeeded: Option<bool>,
}

impl NetwatchWorld {
    pub fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + self.clock, 0).unwrap()
    }

    pub fn address_of(&self, name: &str) -> String {
        self.config
            .targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.address.clone())
            .unwrap_or_else(|| panic!("no monitored host named '{}'", name))
    }

    pub fn add_target(&mut self, name: &str, address: &str) {
        assert!(
            self.engine.is_none(),
            "targets must be declared before the engine starts"
        );
        // Declared targets replace the built-in defaults
        if !self.targets_declared {
            self.config.targets.clear();
            self.targets_declared = true;
        }
        self.config.targets.push(Target::new(name, address));
    }

    /// The engine under test, created on first use from the current config
    pub fn engine(&mut self) -> &MonitorEngine {
        if self.engine.is_none() {
            let state = new_state_handle(self.config.targets.clone());
            let hosts: Arc<dyn EchoProber> = self.hosts.clone();
            let internet: Arc<dyn ConnectProber> = self.internet.clone();
            self.engine = Some(MonitorEngine::new(
                &self.config,
                hosts,
                internet,
                self.log.clone(),
                state,
                CancellationToken::new(),
            ));
        }
        self.engine.as_ref().unwrap()
    }
}
