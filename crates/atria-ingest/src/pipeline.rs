use atria_domain::{
    DomainResult, IdentityResolver, MeasurementBatch, MeasurementRepository, MeasurementRow,
    RealtimeMeasurement, RealtimePublisher,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on each realtime publish call so a stalled hub cannot
    /// hold an otherwise-persisted batch.
    pub broadcast_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            broadcast_timeout: Duration::from_secs(5),
        }
    }
}

/// The single processing path shared by both ingress adapters.
///
/// Flow, short-circuiting on failure:
/// 1. Resolve (tenant slug, device serial) to the canonical identity.
/// 2. Persist one row per metric entry, all in one transaction.
/// 3. Broadcast one realtime measurement per entry, tagged with the slug.
///
/// A batch counts as ingested once its rows commit; broadcast failures and
/// timeouts are logged and never fail the batch. Nothing is retried here —
/// the MQTT adapter drops failed messages, the HTTP adapter reports them.
pub struct IngestionPipeline {
    resolver: Arc<dyn IdentityResolver>,
    measurements: Arc<dyn MeasurementRepository>,
    realtime: Arc<dyn RealtimePublisher>,
    broadcast_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        measurements: Arc<dyn MeasurementRepository>,
        realtime: Arc<dyn RealtimePublisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            resolver,
            measurements,
            realtime,
            broadcast_timeout: config.broadcast_timeout,
        }
    }

    #[instrument(
        skip(self, batch),
        fields(device_serial = %batch.device_id, metric_count = batch.metrics.len())
    )]
    pub async fn process(&self, tenant_slug: &str, batch: &MeasurementBatch) -> DomainResult<()> {
        let identity = self.resolver.resolve(tenant_slug, &batch.device_id).await?;

        let rows: Vec<MeasurementRow> = batch
            .metrics
            .iter()
            .map(|metric| MeasurementRow {
                time: batch.timestamp,
                tenant_id: identity.tenant_id.clone(),
                device_id: identity.device_id.clone(),
                metric_type: metric.metric_type.clone(),
                value: metric.value,
            })
            .collect();

        self.measurements.insert_batch(rows).await?;

        for metric in &batch.metrics {
            let measurement = RealtimeMeasurement {
                tenant_slug: tenant_slug.to_string(),
                device_id: identity.device_id.clone(),
                metric_type: metric.metric_type.clone(),
                value: metric.value,
                unit: metric.unit.clone(),
                time: batch.timestamp,
            };

            match tokio::time::timeout(
                self.broadcast_timeout,
                self.realtime.publish_measurement(&measurement),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, metric_type = %metric.metric_type, "realtime publish failed");
                }
                Err(_) => {
                    warn!(metric_type = %metric.metric_type, "realtime publish timed out");
                }
            }
        }

        debug!("batch ingested");
        Ok(())
    }
}
