//! Netwatch - host liveness monitoring with debounced alerts
//!
//! Probes a fixed set of hosts, checks internet reachability, turns the raw
//! results into alerts with hysteresis and serves them over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod hysteresis;
pub mod icmp;
pub mod internet;
pub mod probe;
pub mod state;
pub mod system_ping;

pub use config::{load_config, Config};
pub use error::{NetwatchError, Result};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::ApiState;
use crate::config::{EchoBackend, ProbeConfig};
use crate::engine::MonitorEngine;
use crate::history::{AlertLog, NoopAlertLog, SqliteAlertLog};
use crate::icmp::IcmpEchoProber;
use crate::probe::{ConnectProber, EchoProber, TcpConnectProber};
use crate::state::StateHandle;
use crate::system_ping::SystemPingProber;

/// Run the netwatch service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    NetwatchBuilder::new(config).build().await?.start().await
}

/// Pick the echo prober for `config`, falling back to the system `ping`
/// command when a raw ICMP socket cannot be opened
pub fn echo_prober_for(config: &ProbeConfig) -> Arc<dyn EchoProber> {
    match config.backend {
        EchoBackend::Icmp => match IcmpEchoProber::new(config) {
            Ok(prober) => {
                tracing::debug!("Using ICMP socket echo prober");
                Arc::new(prober)
            }
            Err(e) => {
                tracing::warn!("ICMP socket unavailable ({}), falling back to system ping", e);
                Arc::new(SystemPingProber::new(config))
            }
        },
        EchoBackend::System => {
            tracing::debug!("Using system ping echo prober");
            Arc::new(SystemPingProber::new(config))
        }
    }
}

/// Builder for a [`Netwatch`] service. Probers and the alert log can be
/// injected; anything not injected is created from the configuration.
pub struct NetwatchBuilder {
    config: Config,
    echo: Option<Arc<dyn EchoProber>>,
    connect: Option<Arc<dyn ConnectProber>>,
    log: Option<Arc<dyn AlertLog>>,
    cancel: Option<CancellationToken>,
}

impl NetwatchBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            echo: None,
            connect: None,
            log: None,
            cancel: None,
        }
    }

    pub fn with_echo_prober(mut self, echo: Arc<dyn EchoProber>) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn with_connect_prober(mut self, connect: Arc<dyn ConnectProber>) -> Self {
        self.connect = Some(connect);
        self
    }

    pub fn with_alert_log(mut self, log: Arc<dyn AlertLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate the configuration and assemble the service
    pub async fn build(self) -> Result<Netwatch> {
        self.config.validate()?;

        let echo = self
            .echo
            .unwrap_or_else(|| echo_prober_for(&self.config.probe));
        let connect: Arc<dyn ConnectProber> = match self.connect {
            Some(connect) => connect,
            None => Arc::new(TcpConnectProber::new()),
        };

        let log: Arc<dyn AlertLog> = match self.log {
            Some(log) => log,
            None if self.config.history.enabled => {
                Arc::new(SqliteAlertLog::open(&self.config.history.path)?)
            }
            None => Arc::new(NoopAlertLog),
        };

        let cancel = self.cancel.unwrap_or_default();
        let state = state::new_state_handle(self.config.targets.clone());

        let engine = MonitorEngine::new(
            &self.config,
            echo,
            connect,
            Arc::clone(&log),
            Arc::clone(&state),
            cancel.clone(),
        );

        Ok(Netwatch {
            config: self.config,
            engine,
            log,
            state,
            cancel,
        })
    }
}

/// A built netwatch service, ready to start
pub struct Netwatch {
    config: Config,
    engine: MonitorEngine,
    log: Arc<dyn AlertLog>,
    state: StateHandle,
    cancel: CancellationToken,
}

impl Netwatch {
    pub fn state(&self) -> StateHandle {
        Arc::clone(&self.state)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn engine(&self) -> &MonitorEngine {
        &self.engine
    }

    /// State shared with the HTTP API
    pub fn api_state(&self) -> ApiState {
        ApiState {
            state: Arc::clone(&self.state),
            log: Arc::clone(&self.log),
            recent_limit: self.config.history.recent_limit,
        }
    }

    /// Run until the cancellation token fires or ctrl-c is received
    pub async fn start(self) -> Result<()> {
        let cancel_for_signal = self.cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                Err(e) => tracing::warn!("Failed to listen for ctrl-c: {}", e),
            }
        });

        if self.config.api.enabled {
            self.spawn_api().await;
        }

        tracing::info!("Netwatch engine started");

        self.engine.run().await;

        tracing::info!("Netwatch engine stopped");
        Ok(())
    }

    async fn bind_api(&self) -> Result<tokio::net::TcpListener> {
        let addr = SocketAddr::new(self.config.api.bind_address, self.config.api.port);
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| NetwatchError::Api(format!("failed to bind {}: {}", addr, e)))
    }

    async fn spawn_api(&self) {
        let listener = match self.bind_api().await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("{}. Continuing without API.", e);
                return;
            }
        };

        if let Ok(bound) = listener.local_addr() {
            tracing::info!("API listening on http://{}", bound);
        }

        let router = api::build_router(self.api_state());
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
            {
                tracing::error!("API server failed: {}", e);
            }
            tracing::debug!("API stopped");
        });
    }
}
