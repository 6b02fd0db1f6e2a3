use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::Restrictions;
use crate::states::{CommandType, DeviceState, EventType};

fn default_actor() -> String {
    "system".to_string()
}

/// An inbound lifecycle/payment event, as submitted by the billing system,
/// the admin console, or the DPC itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub serial_number: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// An append-only record of one committed state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub serial_number: String,
    pub from_state: DeviceState,
    pub to_state: DeviceState,
    pub event: EventType,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// An actuation command queued for a device to pick up on its next poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEntry {
    pub id: Uuid,
    pub serial_number: String,
    pub command: CommandType,
    pub payload: Restrictions,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// The authoritative policy view a DPC enforces for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub serial_number: String,
    pub device_state: DeviceState,
    pub restrictions: Restrictions,
    pub lock_screen_message: String,
    pub protected_packages: Vec<String>,
}

/// Malformed-payload error surfaced as `422 Unprocessable Entity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation(pub String);

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema violation: {}", self.0)
    }
}

impl std::error::Error for SchemaViolation {}

/// Validate a device serial per the wire contract: 1-64 printable
/// (non-control) characters.
pub fn validate_serial(serial: &str) -> Result<(), SchemaViolation> {
    if serial.is_empty() || serial.chars().count() > 64 {
        return Err(SchemaViolation(format!(
            "serial_number must be 1-64 characters, got {}",
            serial.chars().count()
        )));
    }
    if serial.chars().any(|c| c.is_control()) {
        return Err(SchemaViolation(
            "serial_number must not contain control characters".to_string(),
        ));
    }
    Ok(())
}
