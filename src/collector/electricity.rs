//! Electricity Maps carbon-intensity adapter.
//!
//! One GET per tick against the carbon-intensity endpoint, authenticated
//! with a static `auth-token` header. Only the carbon intensity value is
//! published; the response metadata is decoded (leniently) and logged.
//! Fetch failures are transient and skip the tick.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::collector::{Collector, CollectorError, FailurePolicy};
use crate::config::ElectricityConfig;
use crate::metrics::{MetricSpec, Sample};

/// Gauge family for Electricity Maps data.
pub const ELECTRICITY_MAPS: &str = "electricity_maps";

/// Carbon-intensity endpoint polled each tick.
pub const CARBON_INTENSITY_URL: &str = "https://api.electricitymaps.com/v3/carbon-intensity/latest";

/// Header carrying the API key.
const AUTH_TOKEN_HEADER: &str = "auth-token";

/// Zone queried each tick.
const ZONE: &str = "DE";

/// Request timeout (10 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const METRICS: &[MetricSpec] = &[MetricSpec {
    name: ELECTRICITY_MAPS,
    help: "Electricity maps data",
    labels: &["attr"],
}];

/// Decoded carbon-intensity response.
///
/// Only `carbonIntensity` is required; the metadata fields default when
/// missing so an API change there cannot fail the tick.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarbonIntensityResponse {
    carbon_intensity: f64,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    emission_factor_type: String,
    #[serde(default)]
    is_estimated: bool,
    #[serde(default)]
    estimation_method: Option<String>,
    #[serde(default)]
    temporal_granularity: String,
}

/// REST adapter for the Electricity Maps API.
pub struct ElectricityCollector {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ElectricityCollector {
    /// Build the HTTP client with a fixed request timeout.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the client cannot be built.
    pub fn new(config: ElectricityConfig) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| CollectorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: CARBON_INTENSITY_URL.to_string(),
            api_key: config.api_key,
        })
    }

    /// Override the endpoint URL (tests point this at a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Collector for ElectricityCollector {
    fn name(&self) -> &str {
        "electricitymaps"
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Skip
    }

    fn metrics(&self) -> &'static [MetricSpec] {
        METRICS
    }

    async fn collect(&self) -> Result<Vec<Sample>, CollectorError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("zone", ZONE),
                ("emissionFactorType", "lifecycle"),
                ("temporalGranularity", "hourly"),
            ])
            .header(AUTH_TOKEN_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Status(status));
        }

        let data: CarbonIntensityResponse = response.json().await?;
        tracing::info!(
            zone = %data.zone,
            carbon_intensity = data.carbon_intensity,
            datetime = ?data.datetime,
            estimated = data.is_estimated,
            "Fetched carbon intensity"
        );
        tracing::debug!(
            emission_factor_type = %data.emission_factor_type,
            estimation_method = ?data.estimation_method,
            temporal_granularity = %data.temporal_granularity,
            updated_at = ?data.updated_at,
            created_at = ?data.created_at,
            "Response metadata"
        );

        Ok(vec![carbon_intensity_sample(data.carbon_intensity)])
    }
}

/// The published value is the raw decoded field; this adapter applies no
/// scale factor.
fn carbon_intensity_sample(value: f64) -> Sample {
    Sample::new(ELECTRICITY_MAPS, value).with_label("attr", "CarbonIntensity")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_response() {
        let body = r#"{
            "zone": "DE",
            "carbonIntensity": 411,
            "datetime": "2025-09-08T15:00:00.000Z",
            "updatedAt": "2025-09-08T14:58:21.950Z",
            "createdAt": "2025-09-05T21:10:56.973Z",
            "emissionFactorType": "lifecycle",
            "isEstimated": true,
            "estimationMethod": "FORECASTS_HIERARCHY",
            "temporalGranularity": "hourly"
        }"#;

        let data: CarbonIntensityResponse = serde_json::from_str(body).unwrap();
        assert_eq!(data.carbon_intensity, 411.0);
        assert_eq!(data.zone, "DE");
        assert_eq!(data.emission_factor_type, "lifecycle");
        assert!(data.is_estimated);
        assert_eq!(
            data.estimation_method.as_deref(),
            Some("FORECASTS_HIERARCHY")
        );
        assert_eq!(data.temporal_granularity, "hourly");
        assert!(data.datetime.is_some());
        assert!(data.updated_at.is_some());
        assert!(data.created_at.is_some());
    }

    #[test]
    fn test_decode_tolerates_missing_metadata() {
        let data: CarbonIntensityResponse =
            serde_json::from_str(r#"{"carbonIntensity": 301.5}"#).unwrap();
        assert_eq!(data.carbon_intensity, 301.5);
        assert_eq!(data.zone, "");
        assert!(data.datetime.is_none());
        assert!(!data.is_estimated);
    }

    #[test]
    fn test_decode_requires_carbon_intensity() {
        let result = serde_json::from_str::<CarbonIntensityResponse>(r#"{"zone": "DE"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_sample_is_unscaled() {
        let sample = carbon_intensity_sample(411.0);
        assert_eq!(sample.metric, ELECTRICITY_MAPS);
        assert_eq!(sample.value, 411.0);
        assert_eq!(
            sample.labels.get("attr").map(String::as_str),
            Some("CarbonIntensity")
        );
    }
}
