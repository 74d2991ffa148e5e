use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wifid::config::{ConfigPersist, ConfigState, JsonFileStore, MemoryStore};
use wifid::radio::{Radio, SimulatedRadio};
use wifid::rest::{AppState, create_router};

#[derive(Parser)]
#[command(name = "wifid")]
#[command(about = "wifid - WiFi scan listing and configuration service")]
struct Args {
    /// Listen address for the HTTP API
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// File holding the persisted WiFi settings
    #[arg(short, long, default_value = "/var/lib/wifid/wifi.json")]
    config_file: PathBuf,

    /// Delay between committing settings and applying them to the radio
    #[arg(long, default_value = "2000")]
    apply_delay_ms: u64,

    /// Run in development mode (in-memory settings, sample networks)
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wifid=info".parse()?))
        .init();

    let args = Args::parse();

    let persist: Arc<dyn ConfigPersist> = if args.dev {
        warn!("Development mode: settings are not persisted");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::new(&args.config_file))
    };

    let config = ConfigState::load(persist).with_context(|| {
        format!(
            "Failed to load WiFi settings from {}",
            args.config_file.display()
        )
    })?;
    let config = Arc::new(config);

    let radio: Arc<dyn Radio> = Arc::new(SimulatedRadio::new(SimulatedRadio::sample_networks()));

    // Bring the radio up with the loaded settings
    let current = config.current();
    info!(
        opmode = current.opmode.name(),
        ap_ssid = %current.ap_ssid,
        "Applying initial WiFi settings"
    );
    if let Err(e) = radio.apply_settings(&current, Default::default()) {
        warn!(error = %e, "Failed to apply initial WiFi settings");
    }

    let app_state = Arc::new(AppState::new(
        radio,
        config,
        Duration::from_millis(args.apply_delay_ms),
    ));

    // Prime the scan store so the first listing has something to show
    app_state.orchestrator.request_scan();

    let router = create_router(app_state.clone());

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("HTTP API listening on {}", args.listen);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let ctrl_c = signal::ctrl_c();
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {},
                _ = sigterm.recv() => {},
            }
            info!("Shutting down...");
        })
        .await?;

    if app_state.applier.cancel() {
        warn!("Shutdown discarded a pending settings apply");
    }

    Ok(())
}
