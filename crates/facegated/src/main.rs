use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod gate;
mod setup;

use config::Config;
use dbus_interface::{GateService, BUS_NAME, OBJECT_PATH};
use gate::Readiness;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "facegated starting");

    // Logins are refused until setup publishes `Ready`.
    let (readiness_tx, readiness_rx) = watch::channel(Readiness::Loading);

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, GateService::new(readiness_rx))?
        .build()
        .await?;
    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "D-Bus interface registered");

    let setup = tokio::spawn(async move {
        let next = match setup::initialize(&config).await {
            Ok(gate) => {
                tracing::info!("facegated ready");
                Readiness::Ready(Arc::new(gate))
            }
            Err(e) => {
                tracing::error!(error = %e, "setup failed; logins will be refused");
                Readiness::Failed(e.to_string())
            }
        };
        let _ = readiness_tx.send(next);
    });

    tokio::signal::ctrl_c().await?;
    setup.abort();
    tracing::info!("facegated shutting down");

    Ok(())
}
