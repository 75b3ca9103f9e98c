//! Prober traits and the TCP connect probe
//!
//! A probe never fails with an error. Whatever goes wrong on the way to a
//! target is reported as a [`ProbeOutcome`] and collapses to "down".

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Result of one reachability check, with the reason it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable(String),
    TimedOut,
    Failed(String),
}

impl ProbeOutcome {
    /// Whether the hysteresis state machine should see this as "up"
    pub fn is_up(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Reachable => write!(f, "reachable"),
            ProbeOutcome::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            ProbeOutcome::TimedOut => write!(f, "timed out"),
            ProbeOutcome::Failed(reason) => write!(f, "probe failed: {}", reason),
        }
    }
}

/// Echo-style liveness probe against a single host
///
/// Implementations bound their own wall-clock time and must be safe to call
/// concurrently for different addresses.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EchoProber: Send + Sync {
    /// Probe `address` (a literal IP address)
    async fn probe(&self, address: &str) -> ProbeOutcome;
}

/// TCP connect probe used for internet reachability targets
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConnectProber: Send + Sync {
    /// Try to open a TCP connection to `target` within `timeout`
    async fn connect(&self, target: SocketAddr, timeout: Duration) -> ProbeOutcome;
}

/// Production connect prober using tokio sockets
///
/// Targets are socket addresses, so no name resolution happens here.
#[derive(Debug, Default, Clone)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectProber for TcpConnectProber {
    async fn connect(&self, target: SocketAddr, timeout: Duration) -> ProbeOutcome {
        match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => ProbeOutcome::Reachable,
            Ok(Err(e)) => ProbeOutcome::Unreachable(e.to_string()),
            Err(_) => ProbeOutcome::TimedOut,
        }
    }
}
