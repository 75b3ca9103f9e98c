//! Engine: sweeps hosts, checks internet reachability and maintains alerts

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, InternetConfig, Target};
use crate::history::{records_to_persist, AlertLog, HistoryMode};
use crate::hysteresis::{HysteresisPolicy, Transition};
use crate::internet::check_internet;
use crate::probe::{ConnectProber, EchoProber, ProbeOutcome};
use crate::state::{HostOutcome, StateHandle, SweepApplied};

/// The monitor engine. One instance per process, shared by handle with the
/// API.
pub struct MonitorEngine {
    targets: Vec<Target>,
    echo: Arc<dyn EchoProber>,
    connect: Arc<dyn ConnectProber>,
    log: Arc<dyn AlertLog>,
    policy: HysteresisPolicy,
    history_mode: HistoryMode,
    internet: InternetConfig,
    sweep_period: Duration,
    internet_check_period: Duration,
    hard_timeout: Duration,
    limiter: Arc<Semaphore>,
    state: StateHandle,
    cancel: CancellationToken,
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("targets", &self.targets)
            .field("policy", &self.policy)
            .field("history_mode", &self.history_mode)
            .field("sweep_period", &self.sweep_period)
            .field("internet_check_period", &self.internet_check_period)
            .finish()
    }
}

impl MonitorEngine {
    pub fn new(
        config: &Config,
        echo: Arc<dyn EchoProber>,
        connect: Arc<dyn ConnectProber>,
        log: Arc<dyn AlertLog>,
        state: StateHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            targets: config.targets.clone(),
            echo,
            connect,
            log,
            policy: HysteresisPolicy::from(&config.hysteresis),
            history_mode: config.history.mode,
            internet: config.internet.clone(),
            sweep_period: config.schedule.sweep_period,
            internet_check_period: config.schedule.internet_check_period,
            hard_timeout: config.probe.hard_timeout,
            limiter: Arc::new(Semaphore::new(config.workers())),
            state,
            cancel,
        }
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn policy(&self) -> &HysteresisPolicy {
        &self.policy
    }

    /// Run both loops until the cancellation token is triggered
    pub async fn run(&self) {
        tracing::info!(
            "Monitoring {} hosts every {:?}, internet every {:?}",
            self.targets.len(),
            self.sweep_period,
            self.internet_check_period
        );

        tokio::join!(self.host_sweep_loop(), self.internet_loop());
    }

    async fn host_sweep_loop(&self) {
        loop {
            let started = Instant::now();
            let applied = self.sweep_once().await;
            tracing::debug!(
                "Sweep finished in {:?} with {} active alerts",
                started.elapsed(),
                applied.current.records.len()
            );

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_period) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Host sweep loop cancelled");
                    break;
                }
            }
        }
    }

    async fn internet_loop(&self) {
        loop {
            self.check_internet_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.internet_check_period) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Internet check loop cancelled");
                    break;
                }
            }
        }
    }

    /// Probe every host and apply the results at the current instant
    pub async fn sweep_once(&self) -> SweepApplied {
        self.sweep_at(Utc::now()).await
    }

    /// Probe every host, then apply all outcomes under one lock hold using
    /// `now` for every host. History is written after the lock is released.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepApplied {
        let outcomes = self.probe_all().await;

        let applied = {
            let mut state = self.state.write().await;
            state.apply_sweep(&outcomes, now, &self.policy)
        };

        for change in &applied.transitions {
            match change.transition {
                Transition::Raised => {
                    tracing::info!("Alert raised: {} ({}) disconnected", change.name, change.address)
                }
                Transition::Cleared => {
                    tracing::info!("Alert cleared: {} ({}) reachable", change.name, change.address)
                }
                Transition::None => {}
            }
        }

        self.persist(&applied).await;
        applied
    }

    /// One echo probe per target, at most `workers` at a time. Results come
    /// back in target order once every probe has finished or timed out.
    async fn probe_all(&self) -> Vec<HostOutcome> {
        let handles: Vec<_> = self
            .targets
            .iter()
            .map(|target| {
                let echo = Arc::clone(&self.echo);
                let limiter = Arc::clone(&self.limiter);
                let address = target.address.clone();
                let hard_timeout = self.hard_timeout;

                tokio::spawn(async move {
                    let _permit = limiter.acquire_owned().await.ok();
                    tokio::time::timeout(hard_timeout, echo.probe(&address))
                        .await
                        .unwrap_or(ProbeOutcome::TimedOut)
                })
            })
            .collect();

        let joined = join_all(handles).await;

        self.targets
            .iter()
            .zip(joined)
            .map(|(target, result)| {
                let outcome = result.unwrap_or_else(|e| {
                    ProbeOutcome::Failed(format!("probe task failed: {}", e))
                });
                tracing::debug!("Probe {} ({}): {}", target.name, target.address, outcome);
                HostOutcome {
                    address: target.address.clone(),
                    is_up: outcome.is_up(),
                }
            })
            .collect()
    }

    async fn persist(&self, applied: &SweepApplied) {
        let records = records_to_persist(self.history_mode, &applied.previous, &applied.current);
        if records.is_empty() {
            return;
        }

        if let Err(e) = self.log.append(&records).await {
            tracing::warn!("Failed to persist {} alert records: {}", records.len(), e);
        }
    }

    /// Run the internet reachability check and record the result
    pub async fn check_internet_once(&self) -> bool {
        let fallback = self.internet.host_fallback.then_some(&self.state);
        let reachable = check_internet(
            self.connect.as_ref(),
            &self.internet.targets,
            self.internet.timeout,
            fallback,
        )
        .await;

        let was_reachable = {
            let mut state = self.state.write().await;
            let was = state.internet.reachable;
            state.update_internet(reachable, Utc::now());
            was
        };

        match (was_reachable, reachable) {
            (true, false) => tracing::warn!("Internet connectivity lost"),
            (false, true) => tracing::info!("Internet connectivity restored"),
            _ => {}
        }

        reachable
    }
}
