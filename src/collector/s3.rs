//! S3 bucket-usage adapter.
//!
//! Each tick lists every bucket, then lists each bucket's objects (single
//! page) and publishes three per-bucket gauges: total size, size of objects
//! newer than ten days, and size of everything older. Listing failures are
//! transient; a failed bucket listing skips only that bucket.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use chrono::{DateTime, Utc};

use crate::collector::{Collector, CollectorError, FailurePolicy};
use crate::metrics::{MetricSpec, Sample};

/// Total size of files in a bucket.
pub const TOTAL_SIZE: &str = "s3_total_size_bytes";

/// Size of files modified within the age threshold.
pub const NEW_FILES_SIZE: &str = "s3_new_files_size_bytes";

/// Size of files older than the age threshold.
pub const OLD_FILES_SIZE: &str = "s3_old_files_size_bytes";

/// Scale factor applied to every published value.
pub const DEFAULT_SCALE: f64 = 1024.0 * 1024.0 * 10.0;

/// Region the client is pinned to.
pub const DEFAULT_REGION: &str = "eu-north-1";

/// Objects modified within this many days count as "new".
const MAX_OBJECT_AGE_DAYS: i64 = 10;

const METRICS: &[MetricSpec] = &[
    MetricSpec {
        name: TOTAL_SIZE,
        help: "Total size of files in the S3 bucket in bytes",
        labels: &["bucket"],
    },
    MetricSpec {
        name: NEW_FILES_SIZE,
        help: "Total size of new files (created within the last 10 days) in the S3 bucket in bytes",
        labels: &["bucket"],
    },
    MetricSpec {
        name: OLD_FILES_SIZE,
        help: "Total size of old files (created more than 10 days ago) in the S3 bucket in bytes",
        labels: &["bucket"],
    },
];

/// One listed object, reduced to what the transform needs.
#[derive(Debug, Clone)]
struct StoredObject {
    key: String,
    size: i64,
    last_modified: Option<DateTime<Utc>>,
}

/// Per-bucket byte totals for one tick.
#[derive(Debug, Default, Clone, PartialEq)]
struct BucketUsage {
    total_bytes: f64,
    new_bytes: f64,
    old_bytes: f64,
}

/// Storage-listing adapter backed by the AWS SDK.
pub struct S3Collector {
    client: Client,
    scale: f64,
}

impl S3Collector {
    /// Build the client from ambient credentials, pinned to the fixed region.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_REGION))
            .load()
            .await;
        Self {
            client: Client::new(&config),
            scale: DEFAULT_SCALE,
        }
    }

    /// Single-page object listing; no pagination continuation.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StoredObject>, CollectorError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| CollectorError::ObjectStore(format!("{}", DisplayErrorContext(e))))?;

        Ok(response
            .contents()
            .iter()
            .map(|object| StoredObject {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0),
                last_modified: object
                    .last_modified()
                    .and_then(|ts| DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())),
            })
            .collect())
    }
}

#[async_trait]
impl Collector for S3Collector {
    fn name(&self) -> &str {
        "s3"
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Skip
    }

    fn metrics(&self) -> &'static [MetricSpec] {
        METRICS
    }

    async fn collect(&self) -> Result<Vec<Sample>, CollectorError> {
        let listing = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| CollectorError::ObjectStore(format!("{}", DisplayErrorContext(e))))?;

        let cutoff = Utc::now() - chrono::Duration::days(MAX_OBJECT_AGE_DAYS);
        let mut samples = Vec::new();

        for bucket in listing.buckets() {
            let Some(name) = bucket.name() else { continue };

            let objects = match self.list_objects(name).await {
                Ok(objects) => objects,
                Err(e) => {
                    tracing::warn!(bucket = %name, error = %e, "Failed to list objects, skipping bucket");
                    continue;
                }
            };

            for object in &objects {
                tracing::debug!(
                    bucket = %name,
                    key = %object.key,
                    size = object.size,
                    last_modified = ?object.last_modified,
                    "Listed object"
                );
            }

            let usage = split_by_age(&objects, cutoff);
            tracing::info!(
                bucket = %name,
                total_bytes = usage.total_bytes,
                new_bytes = usage.new_bytes,
                old_bytes = usage.old_bytes,
                "Bucket usage"
            );
            samples.extend(usage_samples(name, &usage, self.scale));
        }

        Ok(samples)
    }
}

/// Split object sizes around the cutoff. Objects without a modification
/// timestamp count as old.
fn split_by_age(objects: &[StoredObject], cutoff: DateTime<Utc>) -> BucketUsage {
    let mut usage = BucketUsage::default();
    for object in objects {
        let size = object.size as f64;
        usage.total_bytes += size;
        match object.last_modified {
            Some(ts) if ts > cutoff => usage.new_bytes += size,
            _ => usage.old_bytes += size,
        }
    }
    usage
}

fn usage_samples(bucket: &str, usage: &BucketUsage, scale: f64) -> Vec<Sample> {
    vec![
        Sample::new(TOTAL_SIZE, usage.total_bytes * scale).with_label("bucket", bucket),
        Sample::new(NEW_FILES_SIZE, usage.new_bytes * scale).with_label("bucket", bucket),
        Sample::new(OLD_FILES_SIZE, usage.old_bytes * scale).with_label("bucket", bucket),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn object(key: &str, size: i64, last_modified: Option<DateTime<Utc>>) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            size,
            last_modified,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_split_by_age_around_cutoff() {
        let now = fixed_now();
        let cutoff = now - chrono::Duration::days(MAX_OBJECT_AGE_DAYS);

        let objects = vec![
            object("recent.bin", 100, Some(now - chrono::Duration::days(5))),
            object("stale.bin", 250, Some(now - chrono::Duration::days(15))),
        ];

        let usage = split_by_age(&objects, cutoff);
        assert_eq!(usage.total_bytes, 350.0);
        assert_eq!(usage.new_bytes, 100.0);
        assert_eq!(usage.old_bytes, 250.0);
    }

    #[test]
    fn test_split_by_age_boundary_and_missing_timestamp() {
        let now = fixed_now();
        let cutoff = now - chrono::Duration::days(MAX_OBJECT_AGE_DAYS);

        let objects = vec![
            // Exactly at the cutoff is not "newer than".
            object("boundary.bin", 10, Some(cutoff)),
            object("unknown.bin", 20, None),
        ];

        let usage = split_by_age(&objects, cutoff);
        assert_eq!(usage.total_bytes, 30.0);
        assert_eq!(usage.new_bytes, 0.0);
        assert_eq!(usage.old_bytes, 30.0);
    }

    #[test]
    fn test_empty_bucket_publishes_zeros() {
        let usage = split_by_age(&[], fixed_now());
        assert_eq!(usage, BucketUsage::default());

        let samples = usage_samples("empty-bucket", &usage, DEFAULT_SCALE);
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.value == 0.0));
    }

    #[test]
    fn test_usage_samples_are_scaled_per_bucket() {
        let usage = BucketUsage {
            total_bytes: 350.0,
            new_bytes: 100.0,
            old_bytes: 250.0,
        };

        let samples = usage_samples("media", &usage, DEFAULT_SCALE);
        let value_of = |metric: &str| {
            samples
                .iter()
                .find(|s| s.metric == metric)
                .map(|s| s.value)
                .unwrap()
        };

        assert_eq!(value_of(TOTAL_SIZE), 350.0 * 10_485_760.0);
        assert_eq!(value_of(NEW_FILES_SIZE), 100.0 * 10_485_760.0);
        assert_eq!(value_of(OLD_FILES_SIZE), 250.0 * 10_485_760.0);
        assert!(
            samples
                .iter()
                .all(|s| s.labels.get("bucket").map(String::as_str) == Some("media"))
        );
    }
}
