//! End-to-end pipeline test over in-process components: real resolver with
//! its cache, real telemetry hub, real pipeline — only the registry and the
//! database are replaced at their trait seams.

use async_trait::async_trait;
use atria_domain::{
    DeviceRecord, DomainError, DomainResult, MeasurementBatch, MeasurementRepository,
    MeasurementRow, MetricEntry, MockRegistryClient, StoredMeasurement, TenantRecord,
};
use atria_ingest::{IngestionPipeline, PipelineConfig};
use atria_realtime::{HubConfig, HubPublisher, TelemetryHub};
use atria_registry::{CachingIdentityResolver, ResolverConfig};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Measurement store recording rows in memory.
#[derive(Default)]
struct RecordingRepository {
    rows: Mutex<Vec<MeasurementRow>>,
}

#[async_trait]
impl MeasurementRepository for RecordingRepository {
    async fn insert_batch(&self, rows: Vec<MeasurementRow>) -> DomainResult<()> {
        self.rows.lock().unwrap().extend(rows);
        Ok(())
    }

    async fn count_for_device(&self, device_id: &str) -> DomainResult<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| r.device_id == device_id).count() as i64)
    }

    async fn latest_for_device(
        &self,
        _device_id: &str,
        _limit: i64,
    ) -> DomainResult<Vec<StoredMeasurement>> {
        Ok(vec![])
    }
}

fn registry_with_device() -> MockRegistryClient {
    let mut registry = MockRegistryClient::new();
    registry.expect_tenant_by_slug().times(1).returning(|slug| {
        Ok(Some(TenantRecord {
            id: "TID".to_string(),
            name: "Innovia AB".to_string(),
            slug: slug.to_string(),
        }))
    });
    registry
        .expect_device_by_serial()
        .times(1)
        .returning(|tenant_id, serial| {
            Ok(Some(DeviceRecord {
                id: "DID".to_string(),
                tenant_id: tenant_id.to_string(),
                model: "AQ-200".to_string(),
                serial: serial.to_string(),
                status: "active".to_string(),
            }))
        });
    registry
}

fn timestamp() -> DateTime<Utc> {
    "2024-05-01T12:00:00Z".parse().unwrap()
}

fn co2_batch() -> MeasurementBatch {
    MeasurementBatch {
        device_id: "dev-101".to_string(),
        api_key: "k".to_string(),
        timestamp: timestamp(),
        metrics: vec![MetricEntry {
            metric_type: "co2".to_string(),
            value: 950.0,
            unit: Some("ppm".to_string()),
        }],
    }
}

struct TestHarness {
    pipeline: IngestionPipeline,
    repository: Arc<RecordingRepository>,
    hub: Arc<TelemetryHub>,
}

fn harness(registry: MockRegistryClient) -> TestHarness {
    let resolver = Arc::new(CachingIdentityResolver::new(
        Arc::new(registry),
        ResolverConfig::default(),
    ));
    let repository = Arc::new(RecordingRepository::default());
    let hub = Arc::new(TelemetryHub::new(HubConfig::default()));
    let publisher = Arc::new(HubPublisher::new(Arc::clone(&hub)));

    let pipeline = IngestionPipeline::new(
        resolver,
        Arc::clone(&repository) as Arc<dyn MeasurementRepository>,
        publisher,
        PipelineConfig::default(),
    );

    TestHarness {
        pipeline,
        repository,
        hub,
    }
}

#[tokio::test]
async fn test_batch_persists_and_fans_out_to_tenant_group() {
    let harness = harness(registry_with_device());

    let (tx, mut rx) = mpsc::channel(8);
    let (other_tx, mut other_rx) = mpsc::channel(8);
    harness.hub.join_tenant(1, "innovia", tx).await;
    harness.hub.join_tenant(2, "acme", other_tx).await;

    harness
        .pipeline
        .process("innovia", &co2_batch())
        .await
        .unwrap();

    // Exactly one row, carrying the resolved identity and batch timestamp.
    let rows = harness.repository.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tenant_id, "TID");
    assert_eq!(rows[0].device_id, "DID");
    assert_eq!(rows[0].metric_type, "co2");
    assert_eq!(rows[0].value, 950.0);
    assert_eq!(rows[0].time, timestamp());

    // The joined subscriber got the frame; the other tenant group did not.
    let frame = rx.try_recv().unwrap();
    assert!(frame.contains("\"event\":\"measurementReceived\""));
    assert!(frame.contains("\"tenantSlug\":\"innovia\""));
    assert!(frame.contains("\"deviceId\":\"DID\""));
    assert!(frame.contains("\"type\":\"co2\""));
    assert!(other_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_second_batch_resolves_from_cache() {
    // The mock registry only allows one lookup per endpoint; the second
    // batch must be served from the resolver cache.
    let harness = harness(registry_with_device());

    harness
        .pipeline
        .process("innovia", &co2_batch())
        .await
        .unwrap();
    harness
        .pipeline
        .process("innovia", &co2_batch())
        .await
        .unwrap();

    assert_eq!(harness.repository.rows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unresolvable_batch_leaves_no_trace() {
    let mut registry = MockRegistryClient::new();
    registry
        .expect_tenant_by_slug()
        .times(1)
        .returning(|_| Ok(Some(TenantRecord {
            id: "TID".to_string(),
            name: "Innovia AB".to_string(),
            slug: "innovia".to_string(),
        })));
    registry
        .expect_device_by_serial()
        .times(1)
        .returning(|_, _| Ok(None));

    let harness = harness(registry);

    let (tx, mut rx) = mpsc::channel(8);
    harness.hub.join_tenant(1, "innovia", tx).await;

    let result = harness.pipeline.process("innovia", &co2_batch()).await;
    assert!(matches!(result, Err(DomainError::DeviceNotFound(_))));

    assert!(harness.repository.rows.lock().unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}
