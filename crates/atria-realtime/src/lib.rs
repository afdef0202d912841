pub mod hub;
pub mod publisher;
pub mod ws;

pub use hub::{HubConfig, TelemetryHub};
pub use publisher::HubPublisher;
pub use ws::realtime_router;
