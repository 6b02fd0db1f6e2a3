//! Request and response types for all dp-daemon HTTP endpoints.
//!
//! These types are `Serialize`/`Deserialize` so Axum can JSON-encode and
//! decode them directly; no business logic lives here.

use dp_schemas::{AuditRecord, CommandEntry, CommandType, DeviceState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Response body when a request cannot be processed because its payload
/// is malformed (`422`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaViolationResponse {
    pub error: String,
}

/// Response body for a rejected state transition (`409`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidTransitionResponse {
    pub error: String,
    pub from_state: DeviceState,
}

/// Response body when the circuit breaker is open (`503`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitOpenResponse {
    pub error: String,
}

/// Response body for an unknown serial or command id (`404`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotFoundResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum EventResponse {
    #[serde(rename = "ok")]
    Transitioned {
        serial_number: String,
        from_state: DeviceState,
        to_state: DeviceState,
        event: dp_schemas::EventType,
    },
    #[serde(rename = "duplicate")]
    Duplicate {
        transaction_id: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandsResponse {
    pub serial: String,
    pub commands: Vec<CommandEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: &'static str,
    pub command_id: Uuid,
    pub serial: String,
    pub command: CommandType,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResponse {
    pub serial: String,
    pub records: Vec<AuditRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteDeviceResponse {
    pub status: &'static str,
    pub serial: String,
    pub removed_audit_records: usize,
    pub removed_commands: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub serial: String,
    pub state: DeviceState,
}

#[derive(Debug, Clone, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyUnlockQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyUnlockResponse {
    pub status: &'static str,
    pub unlocked_count: usize,
    pub unlocked_devices: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanaryStartRequest {
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanaryEvaluateRequest {
    pub error_rate: f64,
    pub heartbeat_loss_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum CanaryEvaluateResponse {
    #[serde(rename = "no_active_rollout")]
    NoActiveRollout,
    #[serde(rename = "rolled_back")]
    RolledBack { reason: String },
    #[serde(rename = "promoted")]
    Promoted { stage: &'static str, percent: u8 },
    #[serde(rename = "ga_complete")]
    GaComplete,
}

pub use dp_canary::StageSnapshot as CanaryStatusResponse;
