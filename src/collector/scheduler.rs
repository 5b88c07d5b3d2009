//! Fixed-interval poll scheduler.
//!
//! Drives the fetch → transform → publish cycle for one adapter in a
//! background Tokio task: collect, write the samples into the shared
//! [`GaugeRegistry`], sleep, repeat. The first fetch happens immediately at
//! startup. No jitter, no backoff, no retry count.
//!
//! The loop carries an explicit stop signal ([`PollHandle::stop`]) and a
//! deterministic single-tick entry point ([`PollScheduler::run_once`]) so
//! tests can drive a bounded number of ticks without wall-clock sleeps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::collector::{Collector, CollectorError, FailurePolicy};
use crate::metrics::GaugeRegistry;

/// Interval between poll ticks (60 seconds, all exporters).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum allowed poll interval (1 second).
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The fetch succeeded and this many samples were written.
    Published(usize),
    /// The fetch failed and was skipped; the registry is untouched.
    Skipped,
}

/// Drives one adapter's poll loop against a shared registry.
pub struct PollScheduler {
    registry: Arc<GaugeRegistry>,
    interval: Duration,
}

impl PollScheduler {
    /// Create a scheduler with the default 60-second interval.
    pub fn new(registry: Arc<GaugeRegistry>) -> Self {
        Self {
            registry,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the poll interval. Clamped to a minimum of 1 second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                min_interval = ?MIN_POLL_INTERVAL,
                "Poll interval below minimum, clamping"
            );
            self.interval = MIN_POLL_INTERVAL;
        } else {
            self.interval = interval;
        }
        self
    }

    /// Run exactly one fetch → transform → publish cycle.
    ///
    /// Applies the adapter's [`FailurePolicy`]: a failed tick returns
    /// `Ok(TickOutcome::Skipped)` for skip-style adapters and `Err` for fatal
    /// ones. A successful tick publishes every sample before returning, so a
    /// failure never leaves a partial overwrite behind.
    pub async fn run_once<C: Collector>(
        &self,
        collector: &C,
    ) -> Result<TickOutcome, CollectorError> {
        let started = Instant::now();
        match collector.collect().await {
            Ok(samples) => {
                let published = self.registry.publish_all(&samples)?;
                tracing::debug!(
                    collector = %collector.name(),
                    published,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Poll tick completed"
                );
                Ok(TickOutcome::Published(published))
            }
            Err(e) => match collector.failure_policy() {
                FailurePolicy::Fatal => {
                    tracing::error!(
                        collector = %collector.name(),
                        error = %e,
                        "Poll tick failed"
                    );
                    Err(e)
                }
                FailurePolicy::Skip => {
                    tracing::warn!(
                        collector = %collector.name(),
                        error = %e,
                        "Poll tick failed, keeping last snapshot"
                    );
                    Ok(TickOutcome::Skipped)
                }
            },
        }
    }

    /// Spawn the poll loop as a background task.
    ///
    /// The loop ticks immediately, then every interval, until the handle is
    /// stopped or a fatal tick error terminates it.
    pub fn spawn<C: Collector>(self, collector: C) -> PollHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            for spec in collector.metrics() {
                self.registry.declare(spec)?;
            }

            tracing::info!(
                collector = %collector.name(),
                interval = ?self.interval,
                "Poll loop started"
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        tracing::info!(collector = %collector.name(), "Poll loop stopped");
                        return Ok(());
                    }
                    _ = ticker.tick() => {
                        self.run_once(&collector).await?;
                    }
                }
            }
        });
        PollHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running poll loop.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), CollectorError>>,
}

impl PollHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(self) -> Result<(), CollectorError> {
        let _ = self.shutdown.send(true);
        self.await_task().await
    }

    /// Wait for the loop to terminate on its own.
    ///
    /// Resolves only when a fatal tick error ends the loop (or it was
    /// stopped); skip-style adapters run until the process exits.
    pub async fn join(self) -> Result<(), CollectorError> {
        self.await_task().await
    }

    async fn await_task(self) -> Result<(), CollectorError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(CollectorError::Task(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::metrics::Sample;

    /// Publishes a fixed gauge value, failing on selected calls.
    struct MockCollector {
        policy: FailurePolicy,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
        value: f64,
    }

    impl MockCollector {
        fn ok(policy: FailurePolicy, value: f64) -> Self {
            Self {
                policy,
                calls: AtomicUsize::new(0),
                fail_on: Vec::new(),
                value,
            }
        }

        fn failing_on(policy: FailurePolicy, fail_on: Vec<usize>, value: f64) -> Self {
            Self {
                policy,
                calls: AtomicUsize::new(0),
                fail_on,
                value,
            }
        }
    }

    #[async_trait]
    impl Collector for MockCollector {
        fn name(&self) -> &str {
            "mock"
        }

        fn failure_policy(&self) -> FailurePolicy {
            self.policy
        }

        async fn collect(&self) -> Result<Vec<Sample>, CollectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                return Err(CollectorError::Config("simulated fetch failure".into()));
            }
            Ok(vec![
                Sample::new("mock_gauge", self.value).with_label("source", "mock"),
            ])
        }
    }

    #[tokio::test]
    async fn test_run_once_publishes_samples() {
        let registry = Arc::new(GaugeRegistry::new());
        let scheduler = PollScheduler::new(Arc::clone(&registry));
        let collector = MockCollector::ok(FailurePolicy::Skip, 7.0);

        let outcome = scheduler.run_once(&collector).await.unwrap();
        assert_eq!(outcome, TickOutcome::Published(1));
        assert_eq!(
            registry.sample_value("mock_gauge", &[("source", "mock")]),
            Some(7.0)
        );
    }

    #[tokio::test]
    async fn test_skip_policy_preserves_previous_snapshot() {
        let registry = Arc::new(GaugeRegistry::new());
        let scheduler = PollScheduler::new(Arc::clone(&registry));
        let collector = MockCollector::failing_on(FailurePolicy::Skip, vec![1], 3.0);

        // First tick succeeds, second fails.
        assert_eq!(
            scheduler.run_once(&collector).await.unwrap(),
            TickOutcome::Published(1)
        );
        assert_eq!(
            scheduler.run_once(&collector).await.unwrap(),
            TickOutcome::Skipped
        );

        // The failed tick left the last good value intact.
        assert_eq!(
            registry.sample_value("mock_gauge", &[("source", "mock")]),
            Some(3.0)
        );
    }

    #[tokio::test]
    async fn test_fatal_policy_propagates_error() {
        let registry = Arc::new(GaugeRegistry::new());
        let scheduler = PollScheduler::new(Arc::clone(&registry));
        let collector = MockCollector::failing_on(FailurePolicy::Fatal, vec![0], 1.0);

        let err = scheduler.run_once(&collector).await.unwrap_err();
        assert!(matches!(err, CollectorError::Config(_)));
        assert_eq!(
            registry.sample_value("mock_gauge", &[("source", "mock")]),
            None
        );
    }

    #[tokio::test]
    async fn test_spawn_ticks_immediately_and_stops() {
        let registry = Arc::new(GaugeRegistry::new());
        let scheduler =
            PollScheduler::new(Arc::clone(&registry)).with_interval(Duration::from_secs(60));
        let handle = scheduler.spawn(MockCollector::ok(FailurePolicy::Skip, 11.0));

        // The first tick fires immediately; wait for it without real sleeps
        // between ticks mattering.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if registry
                .sample_value("mock_gauge", &[("source", "mock")])
                .is_some()
            {
                break;
            }
            assert!(Instant::now() < deadline, "first tick never published");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_fatal_error_terminates_loop() {
        let registry = Arc::new(GaugeRegistry::new());
        let scheduler = PollScheduler::new(registry);
        let handle = scheduler.spawn(MockCollector::failing_on(
            FailurePolicy::Fatal,
            vec![0],
            1.0,
        ));

        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("fatal loop should terminate promptly");
        assert!(result.is_err());
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let scheduler = PollScheduler::new(Arc::new(GaugeRegistry::new()))
            .with_interval(Duration::from_millis(100));
        assert_eq!(scheduler.interval, MIN_POLL_INTERVAL);
    }
}
