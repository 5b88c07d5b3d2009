//! Gauge registry shared between the poll loop and the scrape endpoint.
//!
//! The registry is an explicitly owned component: it is constructed once at
//! startup and handed by `Arc` to both the scheduler (writer) and the HTTP
//! handler (reader). Every published [`Sample`] overwrites the live value for
//! its (metric name, label set) key; nothing accumulates across ticks.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur when publishing or rendering metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Underlying prometheus registry error (registration or encoding).
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    /// A sample carried a label set that does not match the gauge family.
    #[error("label mismatch for metric '{metric}': expected {expected:?}, got {got:?}")]
    LabelMismatch {
        metric: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// Encoded exposition output was not valid UTF-8.
    #[error("failed to encode metrics: {0}")]
    Encode(String),
}

/// Static description of a gauge family an adapter publishes into.
///
/// Declared up front so the family carries proper help text and a fixed
/// label-name order in the exposition output.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    /// Metric family name, e.g. `aurora_metadata`.
    pub name: &'static str,
    /// Help text rendered in the exposition format.
    pub help: &'static str,
    /// Label names, in exposition order.
    pub labels: &'static [&'static str],
}

/// One gauge observation: a metric name, a label set and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Metric family name.
    pub metric: String,
    /// Label key/value pairs identifying the series within the family.
    pub labels: BTreeMap<String, String>,
    /// Gauge value to set.
    pub value: f64,
}

impl Sample {
    /// Create a sample with an empty label set.
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            labels: BTreeMap::new(),
            value,
        }
    }

    /// Attach a label key/value pair.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A registered gauge family together with its label-name order.
struct GaugeSlot {
    vec: GaugeVec,
    label_names: Vec<String>,
}

/// Thread-safe map from (metric name, label set) to the last-set gauge value.
///
/// Wraps a non-global [`prometheus::Registry`]. Families are registered via
/// [`GaugeRegistry::declare`] or lazily on first publish; values themselves
/// are synchronized inside the prometheus crate, so concurrent scrapes never
/// observe a torn sample.
pub struct GaugeRegistry {
    registry: Registry,
    slots: Mutex<HashMap<String, GaugeSlot>>,
}

impl GaugeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a gauge family up front. Idempotent per metric name.
    pub fn declare(&self, spec: &MetricSpec) -> Result<(), MetricsError> {
        let mut slots = self.lock_slots();
        if slots.contains_key(spec.name) {
            return Ok(());
        }
        let vec = GaugeVec::new(Opts::new(spec.name, spec.help), spec.labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        slots.insert(
            spec.name.to_string(),
            GaugeSlot {
                vec,
                label_names: spec.labels.iter().map(|l| l.to_string()).collect(),
            },
        );
        Ok(())
    }

    /// Set the gauge for the sample's (metric, label set) key, overwriting any
    /// previous value.
    ///
    /// An undeclared metric name registers a new family on the fly, using the
    /// metric name as help text and the sample's label keys as label names.
    pub fn publish(&self, sample: &Sample) -> Result<(), MetricsError> {
        let mut slots = self.lock_slots();
        let slot = match slots.entry(sample.metric.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let label_names: Vec<String> = sample.labels.keys().cloned().collect();
                let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
                let vec = GaugeVec::new(
                    Opts::new(sample.metric.as_str(), sample.metric.as_str()),
                    &label_refs,
                )?;
                self.registry.register(Box::new(vec.clone()))?;
                entry.insert(GaugeSlot { vec, label_names })
            }
        };

        if sample.labels.len() != slot.label_names.len() {
            return Err(label_mismatch(sample, slot));
        }
        let mut values = Vec::with_capacity(slot.label_names.len());
        for name in &slot.label_names {
            match sample.labels.get(name) {
                Some(value) => values.push(value.as_str()),
                None => return Err(label_mismatch(sample, slot)),
            }
        }

        slot.vec.with_label_values(&values).set(sample.value);
        Ok(())
    }

    /// Publish a batch of samples, returning how many were written.
    pub fn publish_all(&self, samples: &[Sample]) -> Result<usize, MetricsError> {
        for sample in samples {
            self.publish(sample)?;
        }
        Ok(samples.len())
    }

    /// Render the current snapshot in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
    }

    /// Read back the live value for a (metric, label set) key, if present.
    ///
    /// Goes through `gather()` so it never creates the series it looks for.
    pub fn sample_value(&self, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let families = self.registry.gather();
        let family = families.iter().find(|f| f.get_name() == metric)?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                let pairs = m.get_label();
                pairs.len() == labels.len()
                    && labels.iter().all(|(k, v)| {
                        pairs
                            .iter()
                            .any(|p| p.get_name() == *k && p.get_value() == *v)
                    })
            })
            .map(|m| m.get_gauge().get_value())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, GaugeSlot>> {
        // A panic while holding the lock cannot leave a slot half-registered,
        // so recovering from poison is safe here.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for GaugeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn label_mismatch(sample: &Sample, slot: &GaugeSlot) -> MetricsError {
    MetricsError::LabelMismatch {
        metric: sample.metric.clone(),
        expected: slot.label_names.clone(),
        got: sample.labels.keys().cloned().collect(),
    }
}
