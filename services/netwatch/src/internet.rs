//! Internet reachability check

use std::net::SocketAddr;
use std::time::Duration;

use crate::probe::ConnectProber;
use crate::state::StateHandle;

/// Try each target in order and report reachable on the first successful
/// connect. If every target fails and `fallback` is given, connectivity is
/// assumed when any monitored host answered its most recent probe.
pub async fn check_internet(
    prober: &dyn ConnectProber,
    targets: &[SocketAddr],
    timeout: Duration,
    fallback: Option<&StateHandle>,
) -> bool {
    for target in targets {
        let outcome = prober.connect(*target, timeout).await;
        if outcome.is_up() {
            tracing::trace!("Internet check succeeded via {}", target);
            return true;
        }
        tracing::debug!("Internet target {} {}", target, outcome);
    }

    match fallback {
        Some(state) => {
            let seen_up = state.read().await.any_host_seen_up();
            if seen_up {
                tracing::debug!("All internet targets failed, a monitored host is up");
            }
            seen_up
        }
        None => false,
    }
}
