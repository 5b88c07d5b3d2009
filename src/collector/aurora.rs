//! Aurora table-statistics adapter.
//!
//! Polls two fixed views in a MySQL-compatible database and publishes one
//! `aurora_metadata{table, attr}` gauge per numeric column. The connection
//! pool is opened once at startup; query and row-decode failures are fatal.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::{MySqlPool, MySqlRow};

use crate::collector::{Collector, CollectorError, FailurePolicy};
use crate::config::AuroraConfig;
use crate::metrics::{MetricSpec, Sample};

/// Gauge family for all per-table statistics.
pub const AURORA_METADATA: &str = "aurora_metadata";

/// Scale factor applied to every published value.
pub const DEFAULT_SCALE: f64 = 1024.0 * 1024.0 * 10.0;

const TABLE_STATS_QUERY: &str = "SELECT * FROM v_darkdata_stats_rental";
const DUPLICATE_STATS_QUERY: &str = "SELECT * FROM v_doppelte_eintraege";

const METRICS: &[MetricSpec] = &[MetricSpec {
    name: AURORA_METADATA,
    help: "Aurora Metadata",
    labels: &["table", "attr"],
}];

/// Row of `v_darkdata_stats_rental`: per-table totals plus an old/new split.
#[derive(Debug, Clone, PartialEq)]
struct TableStatsRow {
    table_name: String,
    gesamt_anzahl: f64,
    total_size_in_bytes: f64,
    alte_eintraege: f64,
    alte_bytes: f64,
    neue_bytes: f64,
}

/// Row of `v_doppelte_eintraege`: per-table duplicate statistics.
#[derive(Debug, Clone, PartialEq)]
struct DuplicateStatsRow {
    table_name: String,
    doppelte_eintraege: f64,
    gesamt_anzahl: f64,
    einzigartige_eintraege: f64,
    doppelte_bytes: f64,
    total_size_in_bytes: f64,
}

/// Relational adapter backed by a persistent MySQL pool.
pub struct AuroraCollector {
    pool: MySqlPool,
    scale: f64,
}

impl AuroraCollector {
    /// Open the connection pool. An unreachable database is a fatal startup
    /// error.
    pub async fn connect(config: &AuroraConfig) -> Result<Self, CollectorError> {
        let pool = MySqlPool::connect(&config.connection_url()).await?;
        tracing::info!(host = %config.host, database = %config.database, "Database connected");
        Ok(Self {
            pool,
            scale: DEFAULT_SCALE,
        })
    }

    async fn fetch_table_stats(&self) -> Result<Vec<TableStatsRow>, CollectorError> {
        let rows = sqlx::query(TABLE_STATS_QUERY).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode_table_stats_row(row).map_err(CollectorError::from))
            .collect()
    }

    async fn fetch_duplicate_stats(&self) -> Result<Vec<DuplicateStatsRow>, CollectorError> {
        let rows = sqlx::query(DUPLICATE_STATS_QUERY)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| decode_duplicate_stats_row(row).map_err(CollectorError::from))
            .collect()
    }
}

#[async_trait]
impl Collector for AuroraCollector {
    fn name(&self) -> &str {
        "aurora"
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    fn metrics(&self) -> &'static [MetricSpec] {
        METRICS
    }

    async fn collect(&self) -> Result<Vec<Sample>, CollectorError> {
        let stats = self.fetch_table_stats().await?;
        let duplicates = self.fetch_duplicate_stats().await?;

        for row in &stats {
            tracing::debug!(
                table = %row.table_name,
                gesamt_anzahl = row.gesamt_anzahl * self.scale,
                "Fetched table stats"
            );
        }
        for row in &duplicates {
            tracing::debug!(
                table = %row.table_name,
                doppelte_eintraege = row.doppelte_eintraege * self.scale,
                "Fetched duplicate stats"
            );
        }

        let mut samples = table_stats_samples(&stats, self.scale);
        samples.extend(duplicate_stats_samples(&duplicates, self.scale));
        Ok(samples)
    }
}

/// Columns are read positionally, matching the view definitions.
fn decode_table_stats_row(row: &MySqlRow) -> Result<TableStatsRow, sqlx::Error> {
    Ok(TableStatsRow {
        table_name: row.try_get(0)?,
        gesamt_anzahl: row.try_get(1)?,
        total_size_in_bytes: row.try_get(2)?,
        alte_eintraege: row.try_get(3)?,
        alte_bytes: row.try_get(4)?,
        neue_bytes: row.try_get(5)?,
    })
}

fn decode_duplicate_stats_row(row: &MySqlRow) -> Result<DuplicateStatsRow, sqlx::Error> {
    Ok(DuplicateStatsRow {
        table_name: row.try_get(0)?,
        doppelte_eintraege: row.try_get(1)?,
        gesamt_anzahl: row.try_get(2)?,
        einzigartige_eintraege: row.try_get(3)?,
        doppelte_bytes: row.try_get(4)?,
        total_size_in_bytes: row.try_get(5)?,
    })
}

fn attr_sample(table: &str, attr: &str, value: f64, scale: f64) -> Sample {
    Sample::new(AURORA_METADATA, value * scale)
        .with_label("table", table)
        .with_label("attr", attr)
}

fn table_stats_samples(rows: &[TableStatsRow], scale: f64) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(rows.len() * 5);
    for row in rows {
        let table = row.table_name.as_str();
        samples.push(attr_sample(table, "gesamt_anzahl", row.gesamt_anzahl, scale));
        samples.push(attr_sample(
            table,
            "total_size_in_bytes",
            row.total_size_in_bytes,
            scale,
        ));
        samples.push(attr_sample(table, "alte_eintraege", row.alte_eintraege, scale));
        samples.push(attr_sample(table, "alte_bytes", row.alte_bytes, scale));
        samples.push(attr_sample(table, "neue_bytes", row.neue_bytes, scale));
    }
    samples
}

fn duplicate_stats_samples(rows: &[DuplicateStatsRow], scale: f64) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(rows.len() * 5);
    for row in rows {
        let table = row.table_name.as_str();
        samples.push(attr_sample(table, "gesamt_anzahl", row.gesamt_anzahl, scale));
        samples.push(attr_sample(
            table,
            "total_size_in_bytes",
            row.total_size_in_bytes,
            scale,
        ));
        samples.push(attr_sample(
            table,
            "doppelte_eintraege",
            row.doppelte_eintraege,
            scale,
        ));
        samples.push(attr_sample(
            table,
            "einzigartige_eintraege",
            row.einzigartige_eintraege,
            scale,
        ));
        samples.push(attr_sample(table, "doppelte_bytes", row.doppelte_bytes, scale));
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(samples: &[Sample], table: &str, attr: &str) -> f64 {
        samples
            .iter()
            .find(|s| {
                s.labels.get("table").map(String::as_str) == Some(table)
                    && s.labels.get("attr").map(String::as_str) == Some(attr)
            })
            .map(|s| s.value)
            .unwrap_or_else(|| panic!("no sample for {table}/{attr}"))
    }

    #[test]
    fn test_table_stats_samples_are_scaled() {
        let rows = vec![TableStatsRow {
            table_name: "orders".to_string(),
            gesamt_anzahl: 10.0,
            total_size_in_bytes: 1000.0,
            alte_eintraege: 2.0,
            alte_bytes: 200.0,
            neue_bytes: 800.0,
        }];

        let samples = table_stats_samples(&rows, 10_485_760.0);
        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|s| s.metric == AURORA_METADATA));

        assert_eq!(value_of(&samples, "orders", "gesamt_anzahl"), 104_857_600.0);
        assert_eq!(
            value_of(&samples, "orders", "total_size_in_bytes"),
            10_485_760_000.0
        );
        assert_eq!(value_of(&samples, "orders", "alte_eintraege"), 20_971_520.0);
        assert_eq!(value_of(&samples, "orders", "alte_bytes"), 2_097_152_000.0);
        assert_eq!(value_of(&samples, "orders", "neue_bytes"), 8_388_608_000.0);
    }

    #[test]
    fn test_duplicate_stats_samples_are_scaled() {
        let rows = vec![DuplicateStatsRow {
            table_name: "rentals".to_string(),
            doppelte_eintraege: 3.0,
            gesamt_anzahl: 12.0,
            einzigartige_eintraege: 9.0,
            doppelte_bytes: 30.0,
            total_size_in_bytes: 120.0,
        }];

        let samples = duplicate_stats_samples(&rows, 2.0);
        assert_eq!(samples.len(), 5);
        assert_eq!(value_of(&samples, "rentals", "doppelte_eintraege"), 6.0);
        assert_eq!(value_of(&samples, "rentals", "einzigartige_eintraege"), 18.0);
        assert_eq!(value_of(&samples, "rentals", "gesamt_anzahl"), 24.0);
    }

    #[test]
    fn test_empty_result_set_yields_no_samples() {
        assert!(table_stats_samples(&[], DEFAULT_SCALE).is_empty());
        assert!(duplicate_stats_samples(&[], DEFAULT_SCALE).is_empty());
    }

    #[test]
    fn test_default_scale_matches_expected_constant() {
        assert_eq!(DEFAULT_SCALE, 10_485_760.0);
    }
}
