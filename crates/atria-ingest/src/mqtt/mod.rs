mod subscriber;
mod topic;

pub use subscriber::{run_mqtt_ingress, MqttIngressConfig, MEASUREMENT_TOPIC_FILTER};
pub use topic::{parse_topic, ParsedTopic};
