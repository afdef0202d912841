use crate::error::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Canonical identity of a sending device, minted by the registry.
///
/// Both identifiers are opaque strings; the pipeline never inspects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub tenant_id: String,
    pub device_id: String,
}

/// Tenant record as returned by the registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Device record as returned by the registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub tenant_id: String,
    pub model: String,
    pub serial: String,
    pub status: String,
}

/// Lookup client for the external device/tenant registry.
///
/// `None` means the registry answered "not found"; transport failures and
/// undecodable responses surface as errors.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn tenant_by_slug(&self, slug: &str) -> DomainResult<Option<TenantRecord>>;

    async fn device_by_serial(
        &self,
        tenant_id: &str,
        serial: &str,
    ) -> DomainResult<Option<DeviceRecord>>;
}

/// Maps (tenant slug, device serial) to a canonical identity.
///
/// Resolution is idempotent: a second call for the same pair returns the
/// same identity, served from cache without a registry round trip.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        tenant_slug: &str,
        device_serial: &str,
    ) -> DomainResult<ResolvedIdentity>;
}
