use atria_domain::{DomainError, DomainResult};

/// Parsed measurement topic carrying the tenant slug and device serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub tenant_slug: String,
    pub device_serial: String,
}

/// Parse an MQTT topic in the format
/// `tenants/{tenant_slug}/devices/{device_serial}/measurements`.
///
/// The shape is exactly five segments with the literal `tenants`, `devices`
/// and `measurements` markers; anything else is rejected so the subscriber
/// can drop the message.
pub fn parse_topic(topic: &str) -> DomainResult<ParsedTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() != 5 {
        return Err(DomainError::InvalidTopic(format!(
            "'{topic}': expected 'tenants/{{slug}}/devices/{{serial}}/measurements'"
        )));
    }

    if parts[0] != "tenants" || parts[2] != "devices" || parts[4] != "measurements" {
        return Err(DomainError::InvalidTopic(format!(
            "'{topic}': unexpected segment markers"
        )));
    }

    let tenant_slug = parts[1].trim();
    let device_serial = parts[3].trim();

    if tenant_slug.is_empty() {
        return Err(DomainError::InvalidTopic(
            "tenant slug cannot be empty in topic".to_string(),
        ));
    }

    if device_serial.is_empty() {
        return Err(DomainError::InvalidTopic(
            "device serial cannot be empty in topic".to_string(),
        ));
    }

    Ok(ParsedTopic {
        tenant_slug: tenant_slug.to_string(),
        device_serial: device_serial.to_string(),
    })
}
