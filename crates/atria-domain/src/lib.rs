pub mod error;
pub mod identity;
pub mod measurement;
pub mod validate;

pub use error::{DomainError, DomainResult};
pub use identity::{
    DeviceRecord, IdentityResolver, RegistryClient, ResolvedIdentity, TenantRecord,
};
pub use measurement::{
    MeasurementBatch, MeasurementRepository, MeasurementRow, MetricEntry, RealtimeMeasurement,
    RealtimePublisher, StoredMeasurement,
};
pub use validate::{validate_batch, FieldError};

#[cfg(any(test, feature = "testing"))]
pub use identity::{MockIdentityResolver, MockRegistryClient};
#[cfg(any(test, feature = "testing"))]
pub use measurement::{MockMeasurementRepository, MockRealtimePublisher};
