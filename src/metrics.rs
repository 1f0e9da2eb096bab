//! Prometheus metric families for ping results.
//!
//! [`PingMetrics`] owns every exported family and implements the recording
//! semantics: gauges are overwritten each round and set to NaN on failure so
//! a scraper can tell "currently failing" apart from both 0 and "never set";
//! counters only ever move forward by the round's reported deltas.

use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};

use crate::poller::ProbeResult;

const DESTINATION_LABEL: &[&str] = &["destination"];

/// Collection of per-destination ping metrics.
///
/// All families are registered against the injected [`Registry`] at
/// construction time; the registry is the single resource shared with the
/// exposition endpoint.
#[derive(Clone)]
pub struct PingMetrics {
    rtt_min_ms: GaugeVec,
    rtt_avg_ms: GaugeVec,
    rtt_max_ms: GaugeVec,
    rtt_mdev_ms: GaugeVec,
    packet_loss_rate: GaugeVec,
    success: GaugeVec,
    packet_transmit_total: IntCounterVec,
    packet_receive_total: IntCounterVec,
    packet_duplicate_total: IntCounterVec,
}

impl PingMetrics {
    /// Create all metric families and register them with `registry`.
    ///
    /// # Errors
    /// Returns `prometheus::Error` if a family clashes with one already
    /// registered (e.g. two sinks sharing one registry).
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let rtt_min_ms = GaugeVec::new(
            Opts::new("ping_rtt_min_ms", "Minimum RTT (ms)"),
            DESTINATION_LABEL,
        )?;
        let rtt_avg_ms = GaugeVec::new(
            Opts::new("ping_rtt_avg_ms", "Average RTT (ms)"),
            DESTINATION_LABEL,
        )?;
        let rtt_max_ms = GaugeVec::new(
            Opts::new("ping_rtt_max_ms", "Maximum RTT (ms)"),
            DESTINATION_LABEL,
        )?;
        let rtt_mdev_ms = GaugeVec::new(
            Opts::new("ping_rtt_mdev_ms", "RTT standard deviation (ms)"),
            DESTINATION_LABEL,
        )?;
        let packet_loss_rate = GaugeVec::new(
            Opts::new("ping_packet_loss_rate", "Packet loss percent (0-100)"),
            DESTINATION_LABEL,
        )?;
        let success = GaugeVec::new(
            Opts::new("ping_success", "1 if ping succeeded, else 0"),
            DESTINATION_LABEL,
        )?;
        let packet_transmit_total = IntCounterVec::new(
            Opts::new("ping_packet_transmit_total", "Packets transmitted"),
            DESTINATION_LABEL,
        )?;
        let packet_receive_total = IntCounterVec::new(
            Opts::new("ping_packet_receive_total", "Packets received"),
            DESTINATION_LABEL,
        )?;
        let packet_duplicate_total = IntCounterVec::new(
            Opts::new("ping_packet_duplicate_total", "Duplicate packets"),
            DESTINATION_LABEL,
        )?;

        registry.register(Box::new(rtt_min_ms.clone()))?;
        registry.register(Box::new(rtt_avg_ms.clone()))?;
        registry.register(Box::new(rtt_max_ms.clone()))?;
        registry.register(Box::new(rtt_mdev_ms.clone()))?;
        registry.register(Box::new(packet_loss_rate.clone()))?;
        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(packet_transmit_total.clone()))?;
        registry.register(Box::new(packet_receive_total.clone()))?;
        registry.register(Box::new(packet_duplicate_total.clone()))?;

        Ok(Self {
            rtt_min_ms,
            rtt_avg_ms,
            rtt_max_ms,
            rtt_mdev_ms,
            packet_loss_rate,
            success,
            packet_transmit_total,
            packet_receive_total,
            packet_duplicate_total,
        })
    }

    /// Record one host's round result and emit its console summary line.
    ///
    /// Every family is touched on every call, so each destination's metrics
    /// exist in the registry after its very first round, success or not.
    pub fn record(&self, result: &ProbeResult) {
        let dest = result.host.as_str();

        self.success
            .with_label_values(&[dest])
            .set(if result.success { 1.0 } else { 0.0 });

        set_gauge(&self.packet_loss_rate, dest, result.packet_loss_pct);
        set_gauge(&self.rtt_min_ms, dest, result.rtt_min);
        set_gauge(&self.rtt_avg_ms, dest, result.rtt_avg);
        set_gauge(&self.rtt_max_ms, dest, result.rtt_max);
        set_gauge(&self.rtt_mdev_ms, dest, result.rtt_mdev);

        // Deltas are unsigned, so a failure round contributes 0 while still
        // materializing the labeled series.
        self.packet_transmit_total
            .with_label_values(&[dest])
            .inc_by(result.packets_transmitted);
        self.packet_receive_total
            .with_label_values(&[dest])
            .inc_by(result.packets_received);
        self.packet_duplicate_total
            .with_label_values(&[dest])
            .inc_by(result.packets_duplicate);

        match &result.error {
            Some(error) => {
                tracing::error!(host = %dest, error = %error, "probe error");
            }
            None => {
                tracing::info!(
                    host = %dest,
                    loss = %fmt_value(result.packet_loss_pct, "%"),
                    avg = %fmt_value(result.rtt_avg, "ms"),
                    ok = result.success,
                    "round result"
                );
            }
        }
    }
}

impl std::fmt::Debug for PingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PingMetrics").finish_non_exhaustive()
    }
}

/// Gauges are never omitted: an absent value is published as NaN.
fn set_gauge(gauge: &GaugeVec, dest: &str, value: Option<f64>) {
    gauge
        .with_label_values(&[dest])
        .set(value.unwrap_or(f64::NAN));
}

fn fmt_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v}{unit}"),
        None => "n/a".to_string(),
    }
}
