//! S3 bucket-usage exporter.
//!
//! Lists all buckets and their objects every 60 seconds and serves the
//! per-bucket size gauges on port 8080. Credentials come from the ambient
//! AWS provider chain (e.g. `~/.aws/credentials`).

use std::sync::Arc;

use darkwatch::collector::PollScheduler;
use darkwatch::collector::s3::S3Collector;
use darkwatch::config::{S3_PORT, ServerConfig};
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

    tracing::info!("Starting S3 exporter");

    let registry = Arc::new(GaugeRegistry::new());
    let collector = S3Collector::from_env().await;
    let handle = PollScheduler::new(Arc::clone(&registry)).spawn(collector);

    let addr = ServerConfig::new(S3_PORT).socket_addr()?;
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
