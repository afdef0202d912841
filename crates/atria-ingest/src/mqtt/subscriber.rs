use crate::mqtt::parse_topic;
use crate::pipeline::IngestionPipeline;
use atria_domain::{validate_batch, DomainError, DomainResult, MeasurementBatch};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

/// Wildcard filter for measurement topics, QoS 1 (at-least-once).
pub const MEASUREMENT_TOPIC_FILTER: &str = "tenants/+/devices/+/measurements";

/// Broker connection settings for the MQTT ingress.
#[derive(Debug, Clone)]
pub struct MqttIngressConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// Pause between reconnect attempts after a connection failure.
    pub retry_delay: Duration,
}

/// Run the MQTT ingress until shutdown.
///
/// Reconnects with a delay after any connection or event-loop failure, so a
/// transient broker outage never permanently disables the pipeline. Each
/// received message is dispatched onto its own task; on shutdown, in-flight
/// handlers are drained before returning.
#[instrument(name = "mqtt_ingress", skip_all, fields(broker_host = %config.broker_host, broker_port = config.broker_port))]
pub async fn run_mqtt_ingress(
    config: MqttIngressConfig,
    pipeline: Arc<IngestionPipeline>,
    shutdown: CancellationToken,
) {
    let handlers = TaskTracker::new();

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        match run_mqtt_session(&config, Arc::clone(&pipeline), &shutdown, &handlers).await {
            Ok(()) => {
                debug!("MQTT ingress stopped cleanly");
                break;
            }
            Err(e) => {
                error!(error = %e, "MQTT connection error");
                warn!(delay_secs = config.retry_delay.as_secs(), "retrying MQTT connection");

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(config.retry_delay) => {}
                }
            }
        }
    }

    handlers.close();
    handlers.wait().await;
    info!("MQTT ingress stopped");
}

/// Run a single MQTT connection session.
async fn run_mqtt_session(
    config: &MqttIngressConfig,
    pipeline: Arc<IngestionPipeline>,
    shutdown: &CancellationToken,
    handlers: &TaskTracker,
) -> DomainResult<()> {
    let mut mqtt_options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    client
        .subscribe(MEASUREMENT_TOPIC_FILTER, QoS::AtLeastOnce)
        .await
        .map_err(|e| DomainError::TransportError(format!("failed to subscribe: {e}")))?;

    info!(topic = MEASUREMENT_TOPIC_FILTER, "subscribed to MQTT topic");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        // Dispatch so a slow batch never stalls the receive
                        // loop or delivery of subsequent messages.
                        let pipeline = Arc::clone(&pipeline);
                        let topic = publish.topic.clone();
                        let payload = publish.payload.to_vec();
                        handlers.spawn(async move {
                            handle_message(pipeline, topic, payload).await;
                        });
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        debug!("subscription acknowledged");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(DomainError::TransportError(format!(
                            "MQTT event loop error: {e}"
                        )));
                    }
                }
            }
        }
    }
}

/// Handle one incoming MQTT message.
///
/// Every failure mode here drops the message with a log line; nothing
/// propagates past this handler, so one bad message never interrupts the
/// subscription. Each message gets its own root span.
pub(crate) async fn handle_message(
    pipeline: Arc<IngestionPipeline>,
    topic: String,
    payload: Vec<u8>,
) {
    let span = info_span!(
        parent: Span::none(),
        "mqtt_message",
        topic = %topic,
        payload_size = payload.len(),
        device_serial = tracing::field::Empty,
    );

    async {
        let parsed = match parse_topic(&topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "dropping message with unrecognized topic");
                return;
            }
        };

        let mut batch: MeasurementBatch = match serde_json::from_slice(&payload) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "dropping message with undecodable payload");
                return;
            }
        };

        // Producers may omit the serial in the payload; the topic carries it.
        if batch.device_id.trim().is_empty() {
            batch.device_id = parsed.device_serial.clone();
        }

        Span::current().record("device_serial", batch.device_id.as_str());

        if let Err(errors) = validate_batch(&batch) {
            warn!(?errors, "dropping structurally invalid batch");
            return;
        }

        match pipeline.process(&parsed.tenant_slug, &batch).await {
            Ok(()) => {
                info!(
                    metric_count = batch.metrics.len(),
                    tenant_slug = %parsed.tenant_slug,
                    "ingested MQTT batch"
                );
            }
            Err(e) => {
                error!(error = %e, tenant_slug = %parsed.tenant_slug, "failed to ingest MQTT batch");
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use atria_domain::{
        DomainError, MeasurementRow, MockIdentityResolver, MockMeasurementRepository,
        MockRealtimePublisher, ResolvedIdentity,
    };

    const TOPIC: &str = "tenants/innovia/devices/dev-101/measurements";

    fn test_identity() -> ResolvedIdentity {
        ResolvedIdentity {
            tenant_id: "TID".to_string(),
            device_id: "DID".to_string(),
        }
    }

    fn pipeline(
        resolver: MockIdentityResolver,
        measurements: MockMeasurementRepository,
        realtime: MockRealtimePublisher,
    ) -> Arc<IngestionPipeline> {
        Arc::new(IngestionPipeline::new(
            Arc::new(resolver),
            Arc::new(measurements),
            Arc::new(realtime),
            PipelineConfig::default(),
        ))
    }

    fn valid_payload() -> Vec<u8> {
        br#"{
            "deviceId": "dev-101",
            "apiKey": "dev-101-key",
            "timestamp": "2024-05-01T12:00:00Z",
            "metrics": [{"type": "co2", "value": 950.0, "unit": "ppm"}]
        }"#
        .to_vec()
    }

    #[tokio::test]
    async fn test_handle_message_success() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .withf(|slug, serial| slug == "innovia" && serial == "dev-101")
            .times(1)
            .returning(|_, _| Ok(test_identity()));

        let mut measurements = MockMeasurementRepository::new();
        measurements
            .expect_insert_batch()
            .times(1)
            .returning(|_| Ok(()));

        let mut realtime = MockRealtimePublisher::new();
        realtime
            .expect_publish_measurement()
            .times(1)
            .returning(|_| Ok(()));

        handle_message(
            pipeline(resolver, measurements, realtime),
            TOPIC.to_string(),
            valid_payload(),
        )
        .await;
    }

    #[tokio::test]
    async fn test_handle_message_invalid_topic_dropped() {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve().times(0);
        let mut measurements = MockMeasurementRepository::new();
        measurements.expect_insert_batch().times(0);
        let realtime = MockRealtimePublisher::new();

        handle_message(
            pipeline(resolver, measurements, realtime),
            "not/a/measurement/topic".to_string(),
            valid_payload(),
        )
        .await;
    }

    #[tokio::test]
    async fn test_handle_message_malformed_json_dropped() {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve().times(0);
        let mut measurements = MockMeasurementRepository::new();
        measurements.expect_insert_batch().times(0);
        let realtime = MockRealtimePublisher::new();

        handle_message(
            pipeline(resolver, measurements, realtime),
            TOPIC.to_string(),
            b"{not json".to_vec(),
        )
        .await;
    }

    #[tokio::test]
    async fn test_handle_message_backfills_serial_from_topic() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .withf(|_, serial| serial == "dev-101")
            .times(1)
            .returning(|_, _| Ok(test_identity()));

        let mut measurements = MockMeasurementRepository::new();
        measurements
            .expect_insert_batch()
            .times(1)
            .returning(|_| Ok(()));

        let mut realtime = MockRealtimePublisher::new();
        realtime
            .expect_publish_measurement()
            .times(1)
            .returning(|_| Ok(()));

        let payload = br#"{
            "apiKey": "k",
            "timestamp": "2024-05-01T12:00:00Z",
            "metrics": [{"type": "co2", "value": 950.0}]
        }"#
        .to_vec();

        handle_message(
            pipeline(resolver, measurements, realtime),
            TOPIC.to_string(),
            payload,
        )
        .await;
    }

    #[tokio::test]
    async fn test_handle_message_invalid_batch_dropped() {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve().times(0);
        let mut measurements = MockMeasurementRepository::new();
        measurements.expect_insert_batch().times(0);
        let realtime = MockRealtimePublisher::new();

        // Missing apiKey fails structural validation after decode.
        let payload = br#"{
            "deviceId": "dev-101",
            "timestamp": "2024-05-01T12:00:00Z",
            "metrics": [{"type": "co2", "value": 950.0}]
        }"#
        .to_vec();

        handle_message(
            pipeline(resolver, measurements, realtime),
            TOPIC.to_string(),
            payload,
        )
        .await;
    }

    #[tokio::test]
    async fn test_handle_message_pipeline_failure_contained() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, serial| Err(DomainError::DeviceNotFound(serial.to_string())));

        let mut measurements = MockMeasurementRepository::new();
        measurements.expect_insert_batch().times(0);
        let realtime = MockRealtimePublisher::new();

        // Must not panic or propagate; the subscription stays usable.
        handle_message(
            pipeline(resolver, measurements, realtime),
            TOPIC.to_string(),
            valid_payload(),
        )
        .await;
    }

    #[tokio::test]
    async fn test_rows_not_persisted_when_unresolvable() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| Err(DomainError::TenantNotFound("innovia".to_string())));

        let mut measurements = MockMeasurementRepository::new();
        measurements
            .expect_insert_batch()
            .withf(|_rows: &Vec<MeasurementRow>| true)
            .times(0);

        let mut realtime = MockRealtimePublisher::new();
        realtime.expect_publish_measurement().times(0);

        handle_message(
            pipeline(resolver, measurements, realtime),
            TOPIC.to_string(),
            valid_payload(),
        )
        .await;
    }
}
