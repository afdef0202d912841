use async_trait::async_trait;
use atria_domain::{DomainError, DomainResult, IdentityResolver, RegistryClient, ResolvedIdentity};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache policy for resolved identities.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// How long a cached identity stays valid. `None` keeps entries forever;
    /// a registry record that changes (e.g. a device reassigned to another
    /// tenant) then resolves to stale data until restart.
    pub cache_ttl: Option<Duration>,
}

struct CacheEntry {
    identity: ResolvedIdentity,
    resolved_at: Instant,
}

/// Identity resolver backed by the registry with a shared read-through cache.
///
/// The cache is keyed by the composite `"{slug}:{serial}"` string and is
/// accessed concurrently by every pipeline invocation, so it lives behind an
/// async RwLock. Failed resolutions are never cached.
pub struct CachingIdentityResolver {
    registry: Arc<dyn RegistryClient>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_ttl: Option<Duration>,
}

impl CachingIdentityResolver {
    pub fn new(registry: Arc<dyn RegistryClient>, config: ResolverConfig) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: config.cache_ttl,
        }
    }

    fn cache_key(tenant_slug: &str, device_serial: &str) -> String {
        format!("{tenant_slug}:{device_serial}")
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.cache_ttl {
            Some(ttl) => entry.resolved_at.elapsed() < ttl,
            None => true,
        }
    }
}

#[async_trait]
impl IdentityResolver for CachingIdentityResolver {
    #[instrument(skip(self))]
    async fn resolve(
        &self,
        tenant_slug: &str,
        device_serial: &str,
    ) -> DomainResult<ResolvedIdentity> {
        let key = Self::cache_key(tenant_slug, device_serial);

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if self.is_fresh(entry) {
                    debug!("identity served from cache");
                    return Ok(entry.identity.clone());
                }
            }
        }

        let tenant = self
            .registry
            .tenant_by_slug(tenant_slug)
            .await?
            .ok_or_else(|| DomainError::TenantNotFound(tenant_slug.to_string()))?;

        let device = self
            .registry
            .device_by_serial(&tenant.id, device_serial)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_serial.to_string()))?;

        let identity = ResolvedIdentity {
            tenant_id: tenant.id,
            device_id: device.id,
        };

        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CacheEntry {
                identity: identity.clone(),
                resolved_at: Instant::now(),
            },
        );

        debug!(
            tenant_id = %identity.tenant_id,
            device_id = %identity.device_id,
            "identity resolved via registry"
        );

        Ok(identity)
    }
}
