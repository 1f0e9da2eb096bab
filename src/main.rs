//! pingwatch binary entry point.
//!
//! Wires configuration, the metrics registry, the exposition endpoint, and
//! the polling loop together. Core functionality lives in the `pingwatch`
//! library crate.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pingwatch::{
    AppState, HostPoller, IcmpProber, MonitorConfig, PingMetrics, RoundScheduler, create_router,
    server,
};
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ping monitor with Prometheus metrics exposition.
#[derive(Parser, Debug)]
#[command(name = "pingwatch", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(env = "PINGWATCH_CONFIG")]
    config: String,

    /// Metrics port (overrides config file)
    #[arg(long, env = "PINGWATCH_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing; all console output goes to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own usage/help text; only true usage errors
            // are failures.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("pingwatch - ICMP ping monitor");

    tracing::info!(config = %cli.config, "loading configuration");
    let mut config = MonitorConfig::load(&cli.config)?;

    // CLI/env override (CLI > ENV > config file)
    if let Some(port) = cli.metrics_port {
        config.metrics_port = Some(port);
    }

    let registry = Registry::new();
    let metrics = Arc::new(PingMetrics::new(&registry)?);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    // Bind before polling starts so a bad port is fatal, not discovered late.
    let server_task = match config.metrics_port {
        Some(port) => {
            let listener = server::bind(port).await?;
            let router = create_router(AppState {
                registry: registry.clone(),
            });
            tracing::info!(port, "metrics exposed on http://0.0.0.0:{port}/metrics");
            Some(tokio::spawn(server::serve(
                listener,
                router,
                shutdown.clone(),
            )))
        }
        None => None,
    };

    let prober = Arc::new(IcmpProber::new(config.probe_timeout));
    let poller = HostPoller::new(prober, config.probe_count);
    let scheduler = RoundScheduler::new(&config, poller, Arc::clone(&metrics));

    scheduler.run(shutdown.clone()).await;

    if let Some(task) = server_task {
        if let Err(e) = task.await? {
            tracing::warn!(error = %e, "metrics server exited with error");
        }
    }

    tracing::info!("stopped");
    Ok(())
}

/// Cancel the shutdown token on Ctrl+C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received terminate signal, shutting down");
        }
    }

    shutdown.cancel();
}
