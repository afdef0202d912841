use crate::hub::TelemetryHub;
use async_trait::async_trait;
use atria_domain::{DomainResult, RealtimeMeasurement, RealtimePublisher};
use std::sync::Arc;

/// Pipeline-facing publisher backed by the in-process telemetry hub.
pub struct HubPublisher {
    hub: Arc<TelemetryHub>,
}

impl HubPublisher {
    pub fn new(hub: Arc<TelemetryHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl RealtimePublisher for HubPublisher {
    async fn publish_measurement(&self, measurement: &RealtimeMeasurement) -> DomainResult<()> {
        self.hub.publish_measurement(measurement).await
    }
}
