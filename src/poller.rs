//! Per-host probing and result classification.
//!
//! [`HostPoller`] turns the raw statistics (or error) from a [`Prober`] into
//! a tagged [`ProbeResult`]. Prober errors never cross this boundary; they are
//! folded into a failure result carrying the error detail.

use std::sync::Arc;

use crate::probe::{PingStats, Prober};

/// Outcome of probing one host in one round.
///
/// Created fresh each round, consumed immediately by the metrics sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// Host as listed in the configuration.
    pub host: String,
    /// True when the prober returned data with reported loss below 100%.
    pub success: bool,
    /// Packet loss percentage, 0-100. `None` on failure.
    pub packet_loss_pct: Option<f64>,
    /// Minimum RTT in milliseconds. `None` on failure, never zero-filled.
    pub rtt_min: Option<f64>,
    /// Average RTT in milliseconds.
    pub rtt_avg: Option<f64>,
    /// Maximum RTT in milliseconds.
    pub rtt_max: Option<f64>,
    /// RTT standard deviation in milliseconds.
    pub rtt_mdev: Option<f64>,
    /// Echo requests sent this round. 0 on failure.
    pub packets_transmitted: u64,
    /// Echo replies received this round. 0 on failure.
    pub packets_received: u64,
    /// Duplicate replies received this round. 0 on failure.
    pub packets_duplicate: u64,
    /// Prober error detail, when the failure came from an error.
    pub error: Option<String>,
}

impl ProbeResult {
    /// Successful result carrying the prober's statistics.
    pub fn from_stats(host: impl Into<String>, stats: PingStats) -> Self {
        Self {
            host: host.into(),
            success: true,
            packet_loss_pct: stats.packet_loss_pct,
            rtt_min: stats.rtt_min,
            rtt_avg: stats.rtt_avg,
            rtt_max: stats.rtt_max,
            rtt_mdev: stats.rtt_mdev,
            packets_transmitted: stats.packets_transmitted,
            packets_received: stats.packets_received,
            packets_duplicate: stats.packets_duplicate,
            error: None,
        }
    }

    /// Failure result: RTT fields absent, packet counters zero.
    pub fn failure(host: impl Into<String>, error: Option<String>) -> Self {
        Self {
            host: host.into(),
            success: false,
            packet_loss_pct: None,
            rtt_min: None,
            rtt_avg: None,
            rtt_max: None,
            rtt_mdev: None,
            packets_transmitted: 0,
            packets_received: 0,
            packets_duplicate: 0,
            error,
        }
    }
}

/// Stateless per-host poller. One instance serves every configured host.
#[derive(Clone)]
pub struct HostPoller {
    prober: Arc<dyn Prober>,
    count: u32,
}

impl HostPoller {
    /// Create a poller sending `count` echo requests per probe.
    pub fn new(prober: Arc<dyn Prober>, count: u32) -> Self {
        Self { prober, count }
    }

    /// Probe one host and classify the outcome.
    ///
    /// Success requires the prober to return without error AND report a loss
    /// percentage below 100. Everything else is a failure result.
    pub async fn poll(&self, host: &str) -> ProbeResult {
        match self.prober.probe(host, self.count).await {
            Ok(stats) => {
                let reachable = stats.packet_loss_pct.is_some_and(|loss| loss < 100.0);
                if reachable {
                    ProbeResult::from_stats(host, stats)
                } else {
                    ProbeResult::failure(host, None)
                }
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "probe failed");
                ProbeResult::failure(host, Some(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for HostPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPoller")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}
