//! Echo prober backed by the operating system `ping` utility
//!
//! Used when the process cannot open ICMP sockets itself.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::ProbeConfig;
use crate::icmp::required_replies;
use crate::probe::{EchoProber, ProbeOutcome};

/// Echo prober that spawns `ping` and counts reply lines in its output
#[derive(Debug, Clone)]
pub struct SystemPingProber {
    program: String,
    count: u32,
    reply_timeout: Duration,
    hard_timeout: Duration,
}

impl SystemPingProber {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            program: "ping".to_string(),
            count: config.count,
            reply_timeout: config.reply_timeout,
            hard_timeout: config.hard_timeout,
        }
    }

    /// Use a different executable (tests, non-standard installs)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// Command-line arguments for one `ping` invocation
///
/// Windows takes the per-reply timeout in milliseconds. Unix `ping` takes it
/// in whole seconds (at least one) and spaces requests by the reply timeout,
/// no closer than the 200ms unprivileged minimum.
pub fn ping_args(address: &str, count: u32, reply_timeout: Duration, windows: bool) -> Vec<String> {
    if windows {
        vec![
            "-n".to_string(),
            count.to_string(),
            "-w".to_string(),
            reply_timeout.as_millis().to_string(),
            address.to_string(),
        ]
    } else {
        let per_reply_secs = ((reply_timeout.as_millis() + 500) / 1000).max(1);
        let interval = reply_timeout.max(MIN_INTERVAL);
        vec![
            "-c".to_string(),
            count.to_string(),
            "-i".to_string(),
            format!("{:.3}", interval.as_secs_f64()),
            "-W".to_string(),
            per_reply_secs.to_string(),
            address.to_string(),
        ]
    }
}

const MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Whether one line of `ping` output is an echo reply
///
/// Windows prints "Reply from" even for ICMP errors relayed by a gateway, so
/// those lines are not replies.
pub fn is_reply_line(line: &str) -> bool {
    let is_reply = line.contains("Reply from") || line.contains("bytes from");
    is_reply && !line.to_ascii_lowercase().contains("unreachable")
}

#[async_trait]
impl EchoProber for SystemPingProber {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let args = ping_args(address, self.count, self.reply_timeout, cfg!(windows));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                return ProbeOutcome::Failed(format!("failed to start {}: {}", self.program, e));
            }
        };

        let Some(stdout) = child.stdout.take() else {
            return ProbeOutcome::Failed(format!("no output from {}", self.program));
        };

        // Replies are counted as they are printed so the ones seen before the
        // hard cap still count
        let required = required_replies(self.count);
        let mut replies = 0;
        let mut lines = BufReader::new(stdout).lines();
        let counting = async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if is_reply_line(&line) {
                            replies += 1;
                            if replies >= required {
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::trace!("Reading {} output failed: {}", self.program, e);
                        break;
                    }
                }
            }
        };
        let finished = tokio::time::timeout(self.hard_timeout, counting).await.is_ok();

        // Dropping the child kills it if it is still running
        drop(child);

        tracing::trace!(
            "{} {}: {} replies, finished before cap: {}",
            self.program,
            address,
            replies,
            finished
        );

        if replies >= required {
            ProbeOutcome::Reachable
        } else if !finished {
            ProbeOutcome::TimedOut
        } else {
            ProbeOutcome::Unreachable(format!("{}/{} echo replies", replies, self.count))
        }
    }
}
