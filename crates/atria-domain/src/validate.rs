//! Structural validation of inbound batches.

use crate::measurement::MeasurementBatch;
use garde::Validate;
use serde::Serialize;

/// One validation failure, surfaced verbatim to the ingestion caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Check the structural constraints of a batch: device identifier, API key
/// and at least one metric entry. Does not consult the registry and does not
/// mutate the batch.
pub fn validate_batch(batch: &MeasurementBatch) -> Result<(), Vec<FieldError>> {
    match batch.validate() {
        Ok(()) => Ok(()),
        Err(report) => Err(report
            .iter()
            .map(|(path, error)| FieldError {
                field: path.to_string(),
                reason: error.message().to_string(),
            })
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::MetricEntry;
    use chrono::Utc;

    fn valid_batch() -> MeasurementBatch {
        MeasurementBatch {
            device_id: "dev-101".to_string(),
            api_key: "dev-101-key".to_string(),
            timestamp: Utc::now(),
            metrics: vec![MetricEntry {
                metric_type: "co2".to_string(),
                value: 950.0,
                unit: Some("ppm".to_string()),
            }],
        }
    }

    #[test]
    fn test_valid_batch_passes() {
        assert!(validate_batch(&valid_batch()).is_ok());
    }

    #[test]
    fn test_empty_device_id_rejected() {
        let mut batch = valid_batch();
        batch.device_id = String::new();

        let errors = validate_batch(&batch).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "device_id");
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut batch = valid_batch();
        batch.api_key = String::new();

        let errors = validate_batch(&batch).unwrap_err();
        assert_eq!(errors[0].field, "api_key");
    }

    #[test]
    fn test_empty_metrics_rejected() {
        let mut batch = valid_batch();
        batch.metrics.clear();

        let errors = validate_batch(&batch).unwrap_err();
        assert_eq!(errors[0].field, "metrics");
    }

    #[test]
    fn test_all_failures_reported_together() {
        let batch = MeasurementBatch {
            device_id: String::new(),
            api_key: String::new(),
            timestamp: Utc::now(),
            metrics: vec![],
        };

        let errors = validate_batch(&batch).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"device_id"));
        assert!(fields.contains(&"api_key"));
        assert!(fields.contains(&"metrics"));
    }

    #[test]
    fn test_out_of_range_values_accepted() {
        // No numeric range validation is performed; implausible values are
        // stored as-is.
        let mut batch = valid_batch();
        batch.metrics[0].value = -40_000.0;
        assert!(validate_batch(&batch).is_ok());
    }
}
