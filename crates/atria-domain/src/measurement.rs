use crate::error::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// One envelope of measurements from a single device at a single point in time.
///
/// This is the wire shape shared by the HTTP body and the MQTT payload.
/// Producers vary field casing, so each field also accepts its PascalCase
/// spelling. `device_id` carries the device serial; on the MQTT path it may
/// arrive empty and is backfilled from the topic before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementBatch {
    #[garde(length(min = 1))]
    #[serde(default, alias = "DeviceId")]
    pub device_id: String,

    /// Opaque producer credential. Presence is checked, nothing more.
    #[garde(length(min = 1))]
    #[serde(default, alias = "ApiKey")]
    pub api_key: String,

    #[garde(skip)]
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,

    #[garde(length(min = 1))]
    #[serde(default, alias = "Metrics")]
    pub metrics: Vec<MetricEntry>,
}

/// A single reading inside a batch. The type tag is an open string so new
/// metric kinds appear without a code change; values are stored as-is with
/// no range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntry {
    #[serde(rename = "type", alias = "Type")]
    pub metric_type: String,

    #[serde(alias = "Value")]
    pub value: f64,

    #[serde(default, alias = "Unit")]
    pub unit: Option<String>,
}

/// Normalized row handed to the repository: one per metric entry, carrying
/// the batch timestamp and the resolved canonical identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub time: DateTime<Utc>,
    pub tenant_id: String,
    pub device_id: String,
    pub metric_type: String,
    pub value: f64,
}

/// A persisted measurement as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMeasurement {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub tenant_id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub value: f64,
}

/// Transient broadcast form, emitted after persistence succeeds. Tagged with
/// the tenant slug (not the canonical id) because subscribers join by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMeasurement {
    pub tenant_slug: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub value: f64,
    pub unit: Option<String>,
    pub time: DateTime<Utc>,
}

/// Storage seam for normalized measurements.
///
/// Implementations must persist a batch atomically: either every row in the
/// input is durable afterwards or none is.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MeasurementRepository: Send + Sync {
    /// Persist all rows of one batch as a single unit.
    async fn insert_batch(&self, rows: Vec<MeasurementRow>) -> DomainResult<()>;

    /// Number of stored rows for a device, for operational inspection.
    async fn count_for_device(&self, device_id: &str) -> DomainResult<i64>;

    /// Most recent rows for a device, newest first.
    async fn latest_for_device(
        &self,
        device_id: &str,
        limit: i64,
    ) -> DomainResult<Vec<StoredMeasurement>>;
}

/// Fan-out seam towards connected realtime subscribers.
///
/// Delivery is fire-and-forget per subscriber; implementations return an
/// error only when the hub itself is unusable, not when individual
/// subscribers miss a frame.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    async fn publish_measurement(&self, measurement: &RealtimeMeasurement) -> DomainResult<()>;
}
