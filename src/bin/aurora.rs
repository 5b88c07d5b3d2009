//! Aurora table-statistics exporter.
//!
//! Polls two statistics views in the Aurora database every 60 seconds and
//! serves the resulting gauges on port 8081.

use std::sync::Arc;

use darkwatch::collector::PollScheduler;
use darkwatch::collector::aurora::AuroraCollector;
use darkwatch::config::{AURORA_PORT, AuroraConfig, ServerConfig};
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

    let config = AuroraConfig::from_env()?;
    tracing::info!(host = %config.host, database = %config.database, "Starting Aurora exporter");

    let registry = Arc::new(GaugeRegistry::new());
    let collector = AuroraCollector::connect(&config).await?;
    let handle = PollScheduler::new(Arc::clone(&registry)).spawn(collector);

    let addr = ServerConfig::new(AURORA_PORT).socket_addr()?;
    let app = create_router(AppState { registry });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Serving metrics");

    tokio::select! {
        result = handle.join() => {
            // Query errors are unrecoverable for this source.
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
