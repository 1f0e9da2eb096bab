//! ICMP echo probing.
//!
//! [`Prober`] is the capability boundary the rest of the pipeline depends on:
//! given a host and a probe count it returns aggregated raw statistics or an
//! error. The production implementation, [`IcmpProber`], sends sequenced echo
//! requests over a raw ICMP socket via `surge-ping`.

use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use thiserror::Error;
use tokio::time::timeout;

/// Errors that prevent a probe from running at all.
///
/// A host that simply does not answer is not an error; it is reported as
/// [`PingStats`] with 100% loss.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Hostname could not be resolved to an address.
    #[error("failed to resolve host '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Raw ICMP socket could not be created (usually missing privileges).
    #[error("failed to create ICMP client: {0}")]
    Client(#[source] std::io::Error),
}

/// Aggregated raw statistics for one probe run against one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStats {
    /// Percentage of transmitted packets without a reply, 0-100.
    pub packet_loss_pct: Option<f64>,
    /// Minimum RTT in milliseconds. `None` when no replies arrived.
    pub rtt_min: Option<f64>,
    /// Average RTT in milliseconds.
    pub rtt_avg: Option<f64>,
    /// Maximum RTT in milliseconds.
    pub rtt_max: Option<f64>,
    /// RTT standard deviation in milliseconds.
    pub rtt_mdev: Option<f64>,
    /// Echo requests sent.
    pub packets_transmitted: u64,
    /// Echo replies received.
    pub packets_received: u64,
    /// Duplicate replies received.
    pub packets_duplicate: u64,
}

impl PingStats {
    /// Aggregate per-packet RTT samples into round statistics.
    pub fn from_rtts(transmitted: u64, rtts: &[f64]) -> Self {
        let received = rtts.len() as u64;
        let packet_loss_pct = (transmitted > 0)
            .then(|| 100.0 * (transmitted - received) as f64 / transmitted as f64);

        if rtts.is_empty() {
            return Self {
                packet_loss_pct,
                packets_transmitted: transmitted,
                ..Self::default()
            };
        }

        let min = rtts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rtts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = rtts.iter().sum::<f64>() / received as f64;
        let variance = rtts.iter().map(|rtt| (rtt - avg).powi(2)).sum::<f64>() / received as f64;

        Self {
            packet_loss_pct,
            rtt_min: Some(min),
            rtt_avg: Some(avg),
            rtt_max: Some(max),
            rtt_mdev: Some(variance.sqrt()),
            packets_transmitted: transmitted,
            packets_received: received,
            packets_duplicate: 0,
        }
    }
}

/// Probe capability: one aggregated run of `count` echo requests per call.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe `host` with `count` echo requests and aggregate the results.
    async fn probe(&self, host: &str, count: u32) -> Result<PingStats, ProbeError>;
}

/// Production prober backed by a raw ICMP socket.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    /// Per-packet reply timeout.
    timeout: Duration,
}

impl IcmpProber {
    /// Create a prober with the given per-packet timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    // Otherwise, resolve the hostname using tokio's DNS lookup
    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, host: &str, count: u32) -> Result<PingStats, ProbeError> {
        let ip_addr = resolve_host(host)
            .await
            .map_err(|source| ProbeError::Resolve {
                host: host.to_string(),
                source,
            })?;

        // Create ICMP client based on IP version
        let client = match ip_addr {
            IpAddr::V4(_) => Client::new(&Config::default()),
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
        }
        .map_err(ProbeError::Client)?;

        let mut pinger = client.pinger(ip_addr, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        let mut rtts = Vec::with_capacity(count as usize);
        for seq in 0..count {
            match timeout(self.timeout, pinger.ping(PingSequence(seq as u16), &[])).await {
                Ok(Ok((_, rtt))) => {
                    rtts.push(rtt.as_secs_f64() * 1000.0);
                }
                Ok(Err(e)) => {
                    tracing::debug!(host = %host, seq, error = %e, "echo request failed");
                }
                Err(_) => {
                    tracing::debug!(
                        host = %host,
                        seq,
                        timeout_ms = self.timeout.as_millis(),
                        "echo request timed out"
                    );
                }
            }
        }

        Ok(PingStats::from_rtts(u64::from(count), &rtts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_all_replies() {
        let stats = PingStats::from_rtts(4, &[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(stats.packet_loss_pct, Some(0.0));
        assert_eq!(stats.rtt_min, Some(1.0));
        assert_eq!(stats.rtt_avg, Some(2.5));
        assert_eq!(stats.rtt_max, Some(4.0));
        assert_eq!(stats.packets_transmitted, 4);
        assert_eq!(stats.packets_received, 4);
    }

    #[test]
    fn test_stats_partial_loss() {
        let stats = PingStats::from_rtts(4, &[1.0, 3.0]);

        assert_eq!(stats.packet_loss_pct, Some(50.0));
        assert_eq!(stats.rtt_avg, Some(2.0));
        assert_eq!(stats.packets_received, 2);
    }

    #[test]
    fn test_stats_single_sample_has_zero_mdev() {
        let stats = PingStats::from_rtts(1, &[1.2]);
        assert_eq!(stats.rtt_mdev, Some(0.0));
    }

    #[test]
    fn test_stats_no_replies() {
        let stats = PingStats::from_rtts(5, &[]);

        assert_eq!(stats.packet_loss_pct, Some(100.0));
        assert_eq!(stats.rtt_min, None);
        assert_eq!(stats.rtt_avg, None);
        assert_eq!(stats.rtt_max, None);
        assert_eq!(stats.rtt_mdev, None);
        assert_eq!(stats.packets_transmitted, 5);
        assert_eq!(stats.packets_received, 0);
    }

    #[test]
    fn test_stats_mdev() {
        // Samples 1 and 3: mean 2, population std-dev 1.
        let stats = PingStats::from_rtts(2, &[1.0, 3.0]);
        assert!((stats.rtt_mdev.unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_resolve_host_ipv4() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn test_resolve_host_ipv6() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }
}
