use crate::client::PostgresClient;
use async_trait::async_trait;
use atria_domain::{
    DomainError, DomainResult, MeasurementRepository, MeasurementRow, StoredMeasurement,
};
use tracing::{debug, instrument};

/// PostgreSQL implementation of the measurement store.
///
/// Rows are append-only; a batch is written inside one transaction so that a
/// mid-batch failure leaves nothing behind.
#[derive(Clone)]
pub struct PostgresMeasurementRepository {
    client: PostgresClient,
}

impl PostgresMeasurementRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    /// Creates the measurements table and its device/time index when absent.
    /// Run once at startup before ingestion begins.
    pub async fn ensure_schema(&self) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS measurements (
                 id BIGSERIAL PRIMARY KEY,
                 time TIMESTAMPTZ NOT NULL,
                 tenant_id TEXT NOT NULL,
                 device_id TEXT NOT NULL,
                 type TEXT NOT NULL,
                 value DOUBLE PRECISION NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_measurements_device_time
                 ON measurements (device_id, time DESC);",
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("measurements schema ensured");
        Ok(())
    }
}

#[async_trait]
impl MeasurementRepository for PostgresMeasurementRepository {
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    async fn insert_batch(&self, rows: Vec<MeasurementRow>) -> DomainResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let statement = tx
            .prepare(
                "INSERT INTO measurements (time, tenant_id, device_id, type, value)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        for row in &rows {
            tx.execute(
                &statement,
                &[
                    &row.time,
                    &row.tenant_id,
                    &row.device_id,
                    &row.metric_type,
                    &row.value,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("persisted {} measurement rows", rows.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_for_device(&self, device_id: &str) -> DomainResult<i64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM measurements WHERE device_id = $1",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }

    #[instrument(skip(self))]
    async fn latest_for_device(
        &self,
        device_id: &str,
        limit: i64,
    ) -> DomainResult<Vec<StoredMeasurement>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT id, time, tenant_id, device_id, type, value
                 FROM measurements
                 WHERE device_id = $1
                 ORDER BY time DESC
                 LIMIT $2",
                &[&device_id, &limit],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let measurements = rows
            .iter()
            .map(|row| StoredMeasurement {
                id: row.get(0),
                time: row.get(1),
                tenant_id: row.get(2),
                device_id: row.get(3),
                metric_type: row.get(4),
                value: row.get(5),
            })
            .collect();

        Ok(measurements)
    }
}
