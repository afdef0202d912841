pub mod http;
pub mod mqtt;
pub mod pipeline;

pub use http::{ingest_router, IngestState};
pub use mqtt::{run_mqtt_ingress, MqttIngressConfig};
pub use pipeline::{IngestionPipeline, PipelineConfig};
