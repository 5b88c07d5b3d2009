//! Collector Layer
//!
//! Poll-and-publish framework with one source adapter per exporter. The
//! scheduler runs each adapter's fetch → transform → publish cycle in a
//! background Tokio task on a fixed interval.
//!
//! # Architecture
//!
//! - [`Collector`]: core trait for implementing source adapters
//! - [`FailurePolicy`]: declared per-adapter reaction to tick failures
//! - [`PollScheduler`] / [`PollHandle`]: loop lifecycle and stop signal
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use darkwatch::collector::PollScheduler;
//! use darkwatch::collector::electricity::ElectricityCollector;
//! use darkwatch::config::ElectricityConfig;
//! use darkwatch::metrics::GaugeRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(GaugeRegistry::new());
//! let collector = ElectricityCollector::new(ElectricityConfig::from_env()?)?;
//! let handle = PollScheduler::new(Arc::clone(&registry)).spawn(collector);
//! # Ok(())
//! # }
//! ```

pub mod aurora;
pub mod electricity;
pub mod s3;
mod scheduler;
mod traits;

pub use scheduler::{
    DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, PollHandle, PollScheduler, TickOutcome,
};
pub use traits::{Collector, CollectorError, FailurePolicy};
