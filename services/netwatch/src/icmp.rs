//! In-process ICMP echo prober

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config as PingConfig, PingIdentifier, PingSequence, ICMP};

use crate::config::ProbeConfig;
use crate::probe::{EchoProber, ProbeOutcome};

const PAYLOAD: [u8; 32] = [0u8; 32];

/// Replies needed out of `count` echo requests to call a host up
pub fn required_replies(count: u32) -> u32 {
    count / 2 + 1
}

/// Echo prober sending ICMP requests over raw or datagram sockets
pub struct IcmpEchoProber {
    v4: Client,
    v6: Option<Client>,
    count: u32,
    reply_timeout: Duration,
    hard_timeout: Duration,
}

impl std::fmt::Debug for IcmpEchoProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpEchoProber")
            .field("count", &self.count)
            .field("reply_timeout", &self.reply_timeout)
            .field("hard_timeout", &self.hard_timeout)
            .field("ipv6", &self.v6.is_some())
            .finish()
    }
}

impl IcmpEchoProber {
    /// Open the ICMP sockets. Fails when the process lacks the privilege to
    /// create them.
    pub fn new(config: &ProbeConfig) -> crate::Result<Self> {
        let v4 = Client::new(&PingConfig::default()).map_err(|e| {
            crate::NetwatchError::Probe(format!("Failed to open ICMPv4 socket: {}", e))
        })?;

        let v6 = match Client::new(&PingConfig::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::debug!("ICMPv6 unavailable, IPv6 targets will probe down: {}", e);
                None
            }
        };

        Ok(Self {
            v4,
            v6,
            count: config.count,
            reply_timeout: config.reply_timeout,
            hard_timeout: config.hard_timeout,
        })
    }

    async fn echo_round(&self, client: &Client, ip: IpAddr) -> u32 {
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.reply_timeout);

        let mut replies = 0;
        for seq in 0..self.count {
            match pinger.ping(PingSequence(seq as u16), &PAYLOAD).await {
                Ok((_, rtt)) => {
                    tracing::trace!("Echo reply from {} seq={} rtt={:?}", ip, seq, rtt);
                    replies += 1;
                }
                Err(e) => {
                    tracing::trace!("No echo reply from {} seq={}: {}", ip, seq, e);
                }
            }
        }
        replies
    }
}

#[async_trait]
impl EchoProber for IcmpEchoProber {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let ip: IpAddr = match address.parse() {
            Ok(ip) => ip,
            Err(_) => return ProbeOutcome::Failed(format!("not an IP address: {}", address)),
        };

        let client = match (ip, &self.v6) {
            (IpAddr::V4(_), _) => &self.v4,
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => {
                return ProbeOutcome::Failed("no ICMPv6 socket".to_string());
            }
        };

        let replies = match tokio::time::timeout(self.hard_timeout, self.echo_round(client, ip))
            .await
        {
            Ok(replies) => replies,
            Err(_) => return ProbeOutcome::TimedOut,
        };

        if replies >= required_replies(self.count) {
            ProbeOutcome::Reachable
        } else {
            ProbeOutcome::Unreachable(format!("{}/{} echo replies", replies, self.count))
        }
    }
}
