use atria_domain::{DomainError, DomainResult, RealtimeMeasurement};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Tuning for the per-subscriber outbound channels.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Frames buffered per subscriber before the hub starts dropping for
    /// that subscriber. Backpressure never reaches the pipeline.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
        }
    }
}

/// Frame pushed to group members.
#[derive(Serialize)]
struct ServerMessage<'a> {
    event: &'static str,
    data: &'a RealtimeMeasurement,
}

/// In-process realtime hub: tenant slug -> connected subscriber senders.
///
/// Membership is additive for a connection's lifetime; teardown removes the
/// connection from every group. Broadcast is fire-and-forget per subscriber:
/// a full or closed channel drops that subscriber's frame without affecting
/// the others, and no delivery acknowledgement is collected.
pub struct TelemetryHub {
    groups: tokio::sync::RwLock<HashMap<String, HashMap<u64, mpsc::Sender<String>>>>,
    next_connection_id: AtomicU64,
    channel_capacity: usize,
}

impl TelemetryHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            groups: tokio::sync::RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            channel_capacity: config.channel_capacity,
        }
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Adds a connection to a tenant group. Joining the same group twice is
    /// a no-op; joining another group is additive.
    pub async fn join_tenant(
        &self,
        connection_id: u64,
        tenant_slug: &str,
        sender: mpsc::Sender<String>,
    ) {
        let mut groups = self.groups.write().await;
        groups
            .entry(tenant_slug.to_string())
            .or_default()
            .insert(connection_id, sender);
        debug!(connection_id, tenant_slug, "subscriber joined tenant group");
    }

    /// Removes a connection from every group it joined.
    pub async fn remove_connection(&self, connection_id: u64) {
        let mut groups = self.groups.write().await;
        groups.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
        debug!(connection_id, "subscriber connection removed");
    }

    /// Delivers one measurement to every member of the matching tenant
    /// group. Members of other groups never see the frame.
    #[instrument(skip(self, measurement), fields(tenant_slug = %measurement.tenant_slug))]
    pub async fn publish_measurement(
        &self,
        measurement: &RealtimeMeasurement,
    ) -> DomainResult<()> {
        let frame = serde_json::to_string(&ServerMessage {
            event: "measurementReceived",
            data: measurement,
        })
        .map_err(|e| DomainError::DecodeError(format!("realtime frame: {e}")))?;

        let groups = self.groups.read().await;
        let Some(members) = groups.get(&measurement.tenant_slug) else {
            debug!("no subscribers for tenant group");
            return Ok(());
        };

        for (connection_id, sender) in members {
            if sender.try_send(frame.clone()).is_err() {
                debug!(connection_id, "dropping frame for slow or closed subscriber");
            }
        }

        Ok(())
    }
}
