use async_trait::async_trait;
use atria_domain::{DeviceRecord, DomainError, DomainResult, RegistryClient, TenantRecord};
use std::time::Duration;
use tracing::{debug, instrument};

/// Connection settings for the external device/tenant registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Applied to every registry request so a hung registry cannot stall
    /// resolution indefinitely.
    pub request_timeout: Duration,
}

/// HTTP client for the registry lookup endpoints.
///
/// The underlying reqwest client is a long-lived shared resource; it pools
/// connections across concurrent pipeline invocations.
#[derive(Clone)]
pub struct HttpRegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(config: &RegistryConfig) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DomainError::TransportError(format!("registry client init: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_optional<T>(&self, url: String) -> DomainResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DomainError::TransportError(format!("registry request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status().map_err(|e| {
            DomainError::TransportError(format!("registry returned an error status: {e}"))
        })?;

        let record = response
            .json::<T>()
            .await
            .map_err(|e| DomainError::DecodeError(format!("registry response body: {e}")))?;

        Ok(Some(record))
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    #[instrument(skip(self))]
    async fn tenant_by_slug(&self, slug: &str) -> DomainResult<Option<TenantRecord>> {
        let url = format!("{}/api/tenants/by-slug/{}", self.base_url, slug);
        let tenant = self.get_optional::<TenantRecord>(url).await?;
        debug!(found = tenant.is_some(), "tenant lookup completed");
        Ok(tenant)
    }

    #[instrument(skip(self))]
    async fn device_by_serial(
        &self,
        tenant_id: &str,
        serial: &str,
    ) -> DomainResult<Option<DeviceRecord>> {
        let url = format!(
            "{}/api/tenants/{}/devices/by-serial/{}",
            self.base_url, tenant_id, serial
        );
        let device = self.get_optional::<DeviceRecord>(url).await?;
        debug!(found = device.is_some(), "device lookup completed");
        Ok(device)
    }
}
