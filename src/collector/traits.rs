//! Core collector trait and error types.

use async_trait::async_trait;
use thiserror::Error;

use crate::metrics::{MetricSpec, MetricsError, Sample};

/// Errors that can occur during a collection tick.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Database query or row decode failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP transport failure or body decode failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP response carried an unexpected status code.
    #[error("unexpected http status: {0}")]
    Status(reqwest::StatusCode),

    /// Object storage (S3) request failure.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Failed to write samples into the gauge registry.
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// Configuration error (e.g. client construction).
    #[error("config error: {0}")]
    Config(String),

    /// Poll task failure (panic or cancellation).
    #[error("poll task failed: {0}")]
    Task(String),
}

/// How the poll scheduler reacts when a tick fails.
///
/// The original system genuinely differs between sources: a SQL failure is
/// unrecoverable while an HTTP or listing failure is transient. Each adapter
/// declares its policy instead of leaving the difference implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Tick failure terminates the poll loop (and the process).
    Fatal,
    /// Tick failure is logged; the registry keeps the last good snapshot and
    /// the loop continues with the next tick.
    Skip,
}

/// A source adapter: produces zero or more samples from one fetch.
///
/// Implementations fetch from their external source, transform the result
/// into [`Sample`]s and return them; the scheduler owns publication. A failed
/// tick must not have published anything, so stale values from the previous
/// successful tick survive intact.
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Identifier used in log output.
    fn name(&self) -> &str;

    /// Declared reaction to tick failures.
    fn failure_policy(&self) -> FailurePolicy;

    /// Gauge families this adapter publishes into, declared before the first
    /// tick so they carry proper help text.
    fn metrics(&self) -> &'static [MetricSpec] {
        &[]
    }

    /// Perform one fetch and transform it into samples.
    async fn collect(&self) -> Result<Vec<Sample>, CollectorError>;
}
