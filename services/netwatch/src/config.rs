//! Configuration types for the netwatch service

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::history::HistoryMode;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_targets")]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub hysteresis: HysteresisConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub internet: InternetConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            probe: ProbeConfig::default(),
            hysteresis: HysteresisConfig::default(),
            schedule: ScheduleConfig::default(),
            internet: InternetConfig::default(),
            history: HistoryConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// A monitored host. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub address: String,
}

impl Target {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Which echo implementation to use for host probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoBackend {
    /// In-process ICMP echo sockets
    Icmp,
    /// The operating system `ping` utility
    System,
}

/// Echo probe tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_backend")]
    pub backend: EchoBackend,
    #[serde(default = "default_probe_count")]
    pub count: u32,
    #[serde(default = "default_reply_timeout", with = "humantime_serde")]
    pub reply_timeout: Duration,
    #[serde(default = "default_hard_timeout", with = "humantime_serde")]
    pub hard_timeout: Duration,
    /// Parallel probe limit per sweep; `max(4, targets)` when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            count: default_probe_count(),
            reply_timeout: default_reply_timeout(),
            hard_timeout: default_hard_timeout(),
            workers: None,
        }
    }
}

/// Raise/clear thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HysteresisConfig {
    #[serde(default = "default_raise_after_failures")]
    pub raise_after_failures: u32,
    #[serde(default = "default_clear_after_successes")]
    pub clear_after_successes: u32,
    #[serde(default = "default_min_hold", with = "humantime_serde")]
    pub min_hold: Duration,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            raise_after_failures: default_raise_after_failures(),
            clear_after_successes: default_clear_after_successes(),
            min_hold: default_min_hold(),
        }
    }
}

/// Timer periods for the two independent loops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_sweep_period", with = "humantime_serde")]
    pub sweep_period: Duration,
    #[serde(default = "default_internet_check_period", with = "humantime_serde")]
    pub internet_check_period: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sweep_period: default_sweep_period(),
            internet_check_period: default_internet_check_period(),
        }
    }
}

/// Internet reachability check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternetConfig {
    /// Tried in order; literal addresses only
    #[serde(default = "default_internet_targets")]
    pub targets: Vec<SocketAddr>,
    #[serde(default = "default_internet_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Treat any host that answered its last probe as proof of connectivity
    #[serde(default = "default_true")]
    pub host_fallback: bool,
}

impl Default for InternetConfig {
    fn default() -> Self {
        Self {
            targets: default_internet_targets(),
            timeout: default_internet_timeout(),
            host_fallback: true,
        }
    }
}

/// Historical alert log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub mode: HistoryMode,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_history_path(),
            mode: HistoryMode::default(),
            recent_limit: default_recent_limit(),
        }
    }
}

/// HTTP read API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

fn default_targets() -> Vec<Target> {
    vec![
        Target::new("MDC", "172.168.0.80"),
        Target::new("PRAXIS", "192.168.1.101"),
    ]
}

fn default_backend() -> EchoBackend {
    EchoBackend::Icmp
}

fn default_probe_count() -> u32 {
    2
}

fn default_reply_timeout() -> Duration {
    Duration::from_millis(600)
}

fn default_hard_timeout() -> Duration {
    Duration::from_millis(2500)
}

fn default_raise_after_failures() -> u32 {
    3
}

fn default_clear_after_successes() -> u32 {
    2
}

fn default_min_hold() -> Duration {
    Duration::from_secs(15)
}

fn default_sweep_period() -> Duration {
    Duration::from_secs(1)
}

fn default_internet_check_period() -> Duration {
    Duration::from_secs(5)
}

fn default_internet_targets() -> Vec<SocketAddr> {
    ["1.1.1.1:53", "114.114.114.114:53", "8.8.8.8:53", "223.5.5.5:53"]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn default_internet_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_true() -> bool {
    true
}

fn default_history_path() -> PathBuf {
    PathBuf::from("netwatch-history.db")
}

fn default_recent_limit() -> usize {
    20
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_api_port() -> u16 {
    5001
}

impl Config {
    /// Number of concurrent probes allowed in one sweep
    pub fn workers(&self) -> usize {
        self.probe
            .workers
            .unwrap_or_else(|| self.targets.len().max(4))
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: String| Err(crate::NetwatchError::Config(msg));

        if self.targets.is_empty() {
            return fail("at least one target is required".to_string());
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return fail(format!("target {} has an empty name", target.address));
            }
            if target.address.parse::<IpAddr>().is_err() {
                return fail(format!(
                    "target '{}' address '{}' is not an IP address",
                    target.name, target.address
                ));
            }
            if !seen.insert(target.address.as_str()) {
                return fail(format!("duplicate target address {}", target.address));
            }
        }

        if self.probe.count == 0 {
            return fail("probe.count must be at least 1".to_string());
        }
        if self.probe.reply_timeout.is_zero() {
            return fail("probe.reply_timeout must be positive".to_string());
        }
        let Some(budget) = self.probe.reply_timeout.checked_mul(self.probe.count) else {
            return fail(format!(
                "probe.count ({}) x reply_timeout ({:?}) is too large",
                self.probe.count, self.probe.reply_timeout
            ));
        };
        if self.probe.hard_timeout <= budget {
            return fail(format!(
                "probe.hard_timeout ({:?}) must exceed count x reply_timeout ({:?})",
                self.probe.hard_timeout, budget
            ));
        }
        if self.workers() == 0 {
            return fail("probe.workers must be at least 1".to_string());
        }

        if self.hysteresis.raise_after_failures == 0 {
            return fail("hysteresis.raise_after_failures must be at least 1".to_string());
        }
        if self.hysteresis.clear_after_successes == 0 {
            return fail("hysteresis.clear_after_successes must be at least 1".to_string());
        }

        if self.schedule.sweep_period.is_zero() || self.schedule.internet_check_period.is_zero()
        {
            return fail("schedule periods must be positive".to_string());
        }
        if self.internet.timeout.is_zero() {
            return fail("internet.timeout must be positive".to_string());
        }

        if self.history.recent_limit == 0 {
            return fail("history.recent_limit must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::NetwatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
