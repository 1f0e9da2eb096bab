//! Round scheduling.
//!
//! [`RoundScheduler`] drives the polling loop: one pass over all configured
//! hosts in listed order, results forwarded to the metrics sink, then a sleep
//! for the configured interval. Shutdown is cooperative: the cancellation
//! token is checked before each host (an in-flight probe is never aborted)
//! and races the inter-round sleep, so shutdown latency is bounded by one
//! host's probe duration.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::metrics::PingMetrics;
use crate::poller::HostPoller;

/// Sequential per-round scheduler over the configured host list.
#[derive(Debug)]
pub struct RoundScheduler {
    hosts: Vec<String>,
    interval: Duration,
    poller: HostPoller,
    metrics: Arc<PingMetrics>,
}

impl RoundScheduler {
    /// Create a scheduler for the hosts and interval in `config`.
    pub fn new(config: &MonitorConfig, poller: HostPoller, metrics: Arc<PingMetrics>) -> Self {
        Self {
            hosts: config.servers.clone(),
            interval: config.interval(),
            poller,
            metrics,
        }
    }

    /// Poll every configured host once, in listed order.
    ///
    /// A host's failure never prevents the remaining hosts from being polled;
    /// failures arrive here only as data. Returns `false` when cancellation
    /// was observed mid-round, in which case the remaining hosts are skipped.
    pub async fn run_round(&self, shutdown: &CancellationToken) -> bool {
        tracing::info!(
            started_at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            hosts = self.hosts.len(),
            "round started"
        );

        for host in &self.hosts {
            if shutdown.is_cancelled() {
                tracing::info!(next_host = %host, "shutdown requested, stopping round");
                return false;
            }
            let result = self.poller.poll(host).await;
            self.metrics.record(&result);
        }

        true
    }

    /// Run rounds until cancelled.
    ///
    /// The sleep between rounds is skipped as soon as the token fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            if !self.run_round(&shutdown).await {
                break;
            }

            tracing::info!(secs = self.interval.as_secs(), "round complete, sleeping");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("monitoring stopped");
    }
}
