//! darkwatch - Metrics-Polling Exporters
//!
//! This crate provides the shared poll-and-publish framework behind three
//! Prometheus exporters, each shipped as its own binary:
//!
//! - `darkwatch-aurora`: per-table statistics from two Aurora (MySQL) views
//! - `darkwatch-electricitymaps`: carbon intensity from the Electricity Maps API
//! - `darkwatch-s3`: per-bucket object-size usage from S3 listings
//!
//! # Architecture
//!
//! - **Collectors**: one source adapter per exporter, behind a common trait
//! - **Scheduler**: fixed-interval poll loop in a background task
//! - **Metrics**: injected gauge registry with last-set-value semantics
//! - **Server**: `/metrics` scrape endpoint and `/healthz` probe
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use darkwatch::collector::PollScheduler;
//! use darkwatch::collector::s3::S3Collector;
//! use darkwatch::metrics::GaugeRegistry;
//! use darkwatch::server::{AppState, create_router};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(GaugeRegistry::new());
//! let collector = S3Collector::from_env().await;
//! let handle = PollScheduler::new(Arc::clone(&registry)).spawn(collector);
//! let app = create_router(AppState { registry });
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod metrics;
pub mod server;

pub use collector::{
    Collector, CollectorError, DEFAULT_POLL_INTERVAL, FailurePolicy, PollHandle, PollScheduler,
    TickOutcome,
};
pub use config::{AuroraConfig, ConfigError, ElectricityConfig, ServerConfig};
pub use metrics::{GaugeRegistry, MetricSpec, MetricsError, Sample};
