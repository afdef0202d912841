//! Synchronous HTTP ingress adapter.

use crate::pipeline::IngestionPipeline;
use atria_domain::{
    validate_batch, DomainError, MeasurementBatch, MeasurementRepository, StoredMeasurement,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Rows returned by the device diagnostic endpoint.
const DEBUG_LATEST_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct IngestState {
    pub pipeline: Arc<IngestionPipeline>,
    pub measurements: Arc<dyn MeasurementRepository>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDebugResponse {
    device_id: String,
    count: i64,
    latest: Vec<StoredMeasurement>,
}

pub fn ingest_router(state: IngestState) -> Router {
    Router::new()
        .route("/ingest/http/:tenant", post(ingest_batch))
        .route("/ingest/debug/device/:device_id", get(device_debug))
        .with_state(state)
}

/// Accept one measurement batch for a tenant.
///
/// `202 Accepted` means processing completed without error; no stronger
/// guarantee is carried. Validation failures return the field-error list
/// verbatim as a `400` body.
async fn ingest_batch(
    State(state): State<IngestState>,
    Path(tenant): Path<String>,
    Json(batch): Json<MeasurementBatch>,
) -> Response {
    if let Err(errors) = validate_batch(&batch) {
        warn!(
            tenant_slug = %tenant,
            device_serial = %batch.device_id,
            ?errors,
            "validation failed for ingest payload"
        );
        return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
    }

    match state.pipeline.process(&tenant, &batch).await {
        Ok(()) => {
            info!(
                metric_count = batch.metrics.len(),
                device_serial = %batch.device_id,
                tenant_slug = %tenant,
                timestamp = %batch.timestamp,
                "ingested metrics"
            );
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            warn!(tenant_slug = %tenant, error = %e, "ingest failed");
            error_response(e)
        }
    }
}

/// Read-only diagnostic: row count and the most recent rows for a device.
/// Operational inspection only, not part of the ingestion contract.
async fn device_debug(
    State(state): State<IngestState>,
    Path(device_id): Path<String>,
) -> Response {
    let count = match state.measurements.count_for_device(&device_id).await {
        Ok(count) => count,
        Err(e) => return error_response(e),
    };

    let latest = match state
        .measurements
        .latest_for_device(&device_id, DEBUG_LATEST_LIMIT)
        .await
    {
        Ok(latest) => latest,
        Err(e) => return error_response(e),
    };

    Json(DeviceDebugResponse {
        device_id,
        count,
        latest,
    })
    .into_response()
}

fn error_response(error: DomainError) -> Response {
    let status = match &error {
        DomainError::TenantNotFound(_) | DomainError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            message: error.to_string(),
        }),
    )
        .into_response()
}
