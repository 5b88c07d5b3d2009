//! Electricity Maps carbon-intensity exporter.
//!
//! Polls the Electricity Maps API every 60 seconds and serves the carbon
//! intensity gauge on port 8082. Fetch failures keep the last snapshot.

use std::sync::Arc;

use darkwatch::collector::PollScheduler;
use darkwatch::collector::electricity::ElectricityCollector;
use darkwatch::config::{ELECTRICITY_PORT, ElectricityConfig, ServerConfig};
use darkwatch::metrics::GaugeRegistry;
use darkwatch::server::{AppState, create_router, shutdown_signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,darkwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ElectricityConfig::from_env()?;
    tracing::info!("Starting Electricity Maps exporter");

    let registry = Arc::new(GaugeRegistry::new());
    let collector = ElectricityCollector::new(config)?;
    let handle = PollScheduler::new(Arc::clone(&registry)).spawn(collector);

    let addr = ServerConfig::new(ELECTRICITY_PORT).socket_addr()?;
    let app = create_router(AppState { registry });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Serving metrics");

    tokio::select! {
        result = handle.join() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Poll loop terminated");
                return Err(e.into());
            }
        }
        result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()) => {
            result?;
        }
    }

    Ok(())
}
