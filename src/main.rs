use anyhow::Result;
use clap::Parser;
use enphase_venus::acceptor::AcceptAll;
use enphase_venus::config::Config;
use enphase_venus::dbus::{DbusService, ServiceIdentity, pvinverter_paths};
use enphase_venus::engine::PollingEngine;
use enphase_venus::logging::init_logging;
use enphase_venus::scheduler::Scheduler;
use enphase_venus::telemetry::{EnvoyClient, TelemetrySource};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Enphase Envoy PV inverter driver for Victron Venus OS
#[derive(Parser)]
#[command(name = "enphase-venus")]
#[command(version = env!("APP_VERSION"))]
struct Cli {
    /// YAML configuration file (defaults to the standard search locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration problems are fatal and reported before logging exists
    let config = Config::load_validated(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    info!(
        "enphase-venus {} starting up for Envoy at {}",
        env!("APP_VERSION"),
        config.network.ip_address
    );

    let client = Arc::new(
        EnvoyClient::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create Envoy client: {}", e))?,
    );

    let identity = ServiceIdentity::from_config(&config, client.describe());
    let mut dbus = DbusService::new(
        &config.service_name,
        config.device_instance,
        Arc::new(AcceptAll::new()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to create D-Bus service: {}", e))?;
    dbus.register_paths(&identity.path_specs())
        .map_err(|e| anyhow::anyhow!("Failed to register identity paths: {}", e))?;
    dbus.register_paths(&pvinverter_paths(&config.inverter))
        .map_err(|e| anyhow::anyhow!("Failed to register inverter paths: {}", e))?;

    if let Err(e) = dbus.start().await {
        if config.require_dbus {
            error!("D-Bus initialization failed: {}", e);
            return Err(anyhow::anyhow!("D-Bus initialization failed: {}", e));
        }
        warn!(
            "D-Bus initialization failed but require_dbus=false, continuing without D-Bus: {}",
            e
        );
    }
    let dbus = Arc::new(dbus);

    let mut engine = PollingEngine::new(client, dbus.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so the poll loop is not stopped
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let stats = Scheduler::new()
        .repeat_every(config.poll_interval(), &mut engine, shutdown_rx)
        .await;

    let engine_stats = engine.stats();
    info!(
        "Polled {} times: {} failed, {} overruns, last success {}",
        stats.total_runs,
        engine_stats.failed_cycles,
        stats.overrun_count,
        engine_stats
            .last_success_rfc3339()
            .unwrap_or_else(|| "never".to_string())
    );

    if let Err(e) = dbus.stop().await {
        warn!("Failed to stop D-Bus service cleanly: {}", e);
    }
    info!("Driver shutdown complete");
    Ok(())
}
