//! ARP Learning Daemon
//!
//! Main entry point for arplearnd.
//! Attaches the ARP classifier to the monitored interfaces, then learns
//! announced bindings into the neighbor table until SIGINT/SIGTERM.

use arplearnd::{ArpLearnError, Args, LearnerConfig, Result};
use clap::Parser;
use std::process::ExitCode;
#[cfg(target_os = "linux")]
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.log_json) {
        eprintln!("arplearnd: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "arplearnd: Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        attach_to = ?config.attach_to,
        from_interface = %config.from_interface,
        "arplearnd: Starting ARP learning daemon"
    );

    match run_daemon(config).await {
        Ok(()) => {
            info!("arplearnd: Received signal, exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "arplearnd: Daemon exiting with error");
            ExitCode::FAILURE
        }
    }
}

/// Valid RUST_LOG directives win over `--log-level`
fn log_filter(rust_log: Option<&str>, log_level: &str) -> Result<EnvFilter> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(log_level)
        .map_err(|e| ArpLearnError::Config(format!("Invalid log level '{}': {}", log_level, e)))
}

/// Initialize structured logging
fn init_logging(log_level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*};

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = log_filter(rust_log.as_deref(), log_level)?;

    let layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .try_init()
    };

    result.map_err(|e| ArpLearnError::Config(format!("Failed to set logger: {}", e)))
}

#[cfg(target_os = "linux")]
async fn run_daemon(config: LearnerConfig) -> Result<()> {
    use arplearnd::attach::ClassifierAttacher;
    use arplearnd::source::RingBufSource;
    use arplearnd::{
        DebounceStore, MetricsCollector, MonitoredInterface, NeighborLearner,
        NetlinkNeighborTable, attach_all, loader, start_metrics_server,
    };

    let shutdown = setup_signal_handlers()?;

    // The object owns the attached filters; keep it alive for the whole run
    let mut ebpf = loader::load_object(&config.bpf_object)?;
    {
        let program = loader::load_classifier(&mut ebpf, &config.program)?;
        let mut attacher = ClassifierAttacher::new(program, config.program.clone());
        attach_all(&mut attacher, &config.attach_to)?;
    }

    let egress = MonitoredInterface::resolve(&config.from_interface)?;
    info!(egress = %egress, "arplearnd: Resolved egress interface");

    let ring_buf = loader::take_events_map(&mut ebpf, &config.events_map)?;
    let source = RingBufSource::new(ring_buf, shutdown.clone())?;
    let table = NetlinkNeighborTable::new()?;

    let metrics = MetricsCollector::new()
        .map_err(|e| ArpLearnError::Config(format!("Failed to create metrics: {}", e)))?;
    if let Some(port) = config.metrics_port {
        let collector = metrics.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(collector, port, token).await {
                error!(error = %e, port, "arplearnd: Metrics server failed");
            }
        });
    }

    let mut learner = NeighborLearner::new(
        source,
        table,
        egress.index,
        DebounceStore::new(config.debounce_window, config.retention_multiplier),
        metrics,
    )
    .with_max_read_errors(config.max_read_errors);

    let result = learner.run().await;
    shutdown.cancel();
    drop(ebpf);
    result
}

#[cfg(not(target_os = "linux"))]
async fn run_daemon(_config: LearnerConfig) -> Result<()> {
    Err(ArpLearnError::Config(
        "arplearnd requires Linux (tc classifiers and rtnetlink)".to_string(),
    ))
}

/// Cancel the returned token on SIGINT or SIGTERM. Cancelling closes the
/// event source.
#[cfg(target_os = "linux")]
fn setup_signal_handlers() -> Result<CancellationToken> {
    use tokio::signal::unix::{SignalKind, signal};

    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let handler_token = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("arplearnd: Received SIGINT"),
            _ = sigterm.recv() => info!("arplearnd: Received SIGTERM"),
            _ = handler_token.cancelled() => return,
        }
        handler_token.cancel();
    });

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_accepts_level() {
        let filter = log_filter(None, "debug").unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_log_filter_rejects_bad_level() {
        let err = log_filter(None, "arplearnd=loud").unwrap_err();
        assert!(matches!(err, ArpLearnError::Config(ref msg) if msg.contains("arplearnd=loud")));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rust_log_overrides_level() {
        let filter = log_filter(Some("arplearnd=trace"), "arplearnd=loud").unwrap();
        assert_eq!(filter.to_string(), "arplearnd=trace");

        // Unparseable RUST_LOG falls back to the flag
        let filter = log_filter(Some("arplearnd=loud"), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }
}
