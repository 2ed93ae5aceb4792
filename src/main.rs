//! Garage geofence - closes the garage door when a car leaves, opens it on return
//!
//! Module structure:
//! - `domain/` - Core types (Point, Fence, VehicleState, DoorState)
//! - `io/` - External interfaces (MQTT, door HTTP API, Prometheus)
//! - `services/` - Business logic (GeofenceEngine, DoorActuator, Dispatcher)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::{bail, Context};
use clap::Parser;
use garage_geofence::domain::VehicleId;
use garage_geofence::infra::config::parse_bool;
use garage_geofence::infra::{Config, Metrics, ShutdownSignals};
use garage_geofence::io::{DoorController, HttpDoorController};
use garage_geofence::services::{ActuationSettings, Dispatcher, DoorActuator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Grace period after shutdown for the broker disconnect handshake
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Geofence-driven garage door controller
#[derive(Parser, Debug)]
#[command(name = "garage-geofence", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Log intended actions without contacting the door backend
    #[arg(short, long)]
    testing: bool,

    /// List devices known to the door backend and exit
    #[arg(short = 'd', long)]
    list_devices: bool,
}

fn init_tracing() {
    // RUST_LOG wins; otherwise DEBUG=true raises the default level
    let default_level = match std::env::var("DEBUG").ok().as_deref().and_then(parse_bool) {
        Some(true) => "debug",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let path = Config::resolve_config_path(args.config.as_deref());
    let mut config = Config::from_file(&path)?;
    config.apply_env_overrides();
    if args.testing {
        config.set_testing(true);
    }
    config.validate().with_context(|| format!("Invalid configuration in {path}"))?;
    Ok(config)
}

async fn list_devices(controller: &HttpDoorController) -> anyhow::Result<()> {
    let session = controller.authenticate().await?;
    let devices = controller.list_devices(&session).await?;

    println!("{:<24} {:<12} {:<16} {}", "NAME", "STATE", "TYPE", "SERIAL");
    for device in devices {
        println!("{:<24} {:<12} {:<16} {}", device.name, device.state.to_string(), device.device_type, device.serial);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "garage-geofence starting");

    let args = Args::parse();
    let config = load_config(&args)?;

    if !config.has_door_credentials() && (args.list_devices || !config.testing()) {
        bail!("door credentials missing: set door.email/door.password or DOOR_EMAIL/DOOR_PASSWORD");
    }

    let controller = HttpDoorController::new(&config).context("Failed to build door HTTP client")?;

    if args.list_devices {
        return list_devices(&controller).await;
    }

    info!(
        config_file = %config.config_file(),
        mqtt_host = %config.mqtt_host(),
        mqtt_port = %config.mqtt_port(),
        topic_prefix = %config.mqtt_topic_prefix(),
        vehicles = %config.vehicles().len(),
        poll_interval_ms = %config.poll_interval_ms(),
        timeout_ms = %config.actuation_timeout_ms(),
        cooldown_minutes = %config.cooldown_minutes(),
        at_home_policy = ?config.at_home_policy(),
        transitional_policy = ?config.transitional_policy(),
        testing = %config.testing(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let metrics = Arc::new(Metrics::new());

    let actuator = Arc::new(DoorActuator::new(
        Arc::new(controller),
        ActuationSettings::from_config(&config),
        metrics.clone(),
        shutdown_rx.clone(),
    ));
    let mut dispatcher = Dispatcher::new(config.vehicle_states(), actuator, metrics.clone());
    let vehicle_ids: Vec<VehicleId> = dispatcher.vehicle_ids().collect();

    // Create location channel (bounded for backpressure)
    let (event_tx, event_rx) = mpsc::channel(1000);

    // Start MQTT client
    let mqtt_config = config.clone();
    let mqtt_metrics = metrics.clone();
    let mqtt_shutdown = shutdown_rx.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = garage_geofence::io::mqtt::start_mqtt_client(
            &mqtt_config,
            &vehicle_ids,
            event_tx,
            mqtt_metrics,
            mqtt_shutdown,
        )
        .await
        {
            error!(error = %e, "mqtt_client_error");
        }
    });

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) =
                garage_geofence::io::prometheus::start_metrics_server(prometheus_port, prom_metrics, prom_shutdown)
                    .await
            {
                error!(error = %e, "prometheus_server_error");
            }
        });
    }

    // Start metrics reporter
    let reporter_metrics = metrics.clone();
    let metrics_interval = Duration::from_secs(config.metrics_interval_secs().max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(metrics_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            reporter_metrics.report().log();
        }
    });

    // Handle shutdown on Ctrl+C or SIGTERM
    let mut signals = ShutdownSignals::install().context("Failed to install signal handlers")?;
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!(signal = %signal, "shutdown_signal_received");
        let _ = signal_tx.send(true);
    });

    // Consume updates until shutdown or the transport goes away
    dispatcher.run(event_rx, shutdown_rx).await;

    // Also reached when the transport exits on its own; stop cooldowns and servers
    let _ = shutdown_tx.send(true);

    if let Err(e) = mqtt_handle.await {
        error!(error = %e, "mqtt_task_failed");
    }
    dispatcher.drain().await;
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    info!("garage-geofence shutdown complete");
    Ok(())
}
