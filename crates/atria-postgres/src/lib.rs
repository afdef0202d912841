pub mod client;
pub mod measurement_repository;

pub use client::{PostgresClient, PostgresConfig};
pub use measurement_repository::PostgresMeasurementRepository;
