//! The policy engine: the single critical section that ties the
//! Repository, Circuit Breaker, and transition table together.
//!
//! `apply_event` and `emergency_unlock` are the only operations that
//! mutate more than one store at a time; both run under
//! [`PolicyEngine::critical_section`] so that a concurrent reader never
//! observes a state write without its matching audit record, and so the
//! breaker's trip decision is never raced against a second event for the
//! same device.

use std::sync::Mutex;

use chrono::Utc;
use dp_breaker::CircuitBreaker;
use dp_repository::Repository;
use dp_schemas::{
    policy_template, state_to_command, transition, AuditRecord, CommandEntry, CommandType,
    DeviceState, EventPayload, EventType, PolicyResponse,
};
use uuid::Uuid;

/// Caller-facing failures from the policy engine. Mirrors the error
/// taxonomy mapped to HTTP status codes at the daemon boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidTransition { from: DeviceState, event: EventType },
    CircuitOpen,
    NotFound,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, event } => {
                write!(f, "invalid transition: {from} + {event}")
            }
            Self::CircuitOpen => write!(f, "circuit breaker open"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<dp_repository::NotFound> for EngineError {
    fn from(_: dp_repository::NotFound) -> Self {
        EngineError::NotFound
    }
}

/// Result of a successful `apply_event` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Duplicate {
        transaction_id: String,
    },
    Transitioned {
        serial_number: String,
        from_state: DeviceState,
        to_state: DeviceState,
        event: EventType,
    },
}

/// Outcome of `emergency_unlock`.
#[derive(Debug, Clone)]
pub struct EmergencyUnlockResult {
    pub unlocked_count: usize,
    pub unlocked_devices: Vec<String>,
    pub reason: String,
}

const LOCK_PRODUCING_STATES: [DeviceState; 2] = [DeviceState::SoftLocked, DeviceState::HardLocked];
const EMERGENCY_ELIGIBLE_STATES: [DeviceState; 3] = [
    DeviceState::SoftLocked,
    DeviceState::HardLocked,
    DeviceState::Suspended,
];

/// Process-wide domain engine: the device-policy state machine plus the
/// circuit breaker it consults before committing a lock.
pub struct PolicyEngine {
    repository: Repository,
    breaker: Mutex<CircuitBreaker>,
    /// Serializes composite multi-store mutations (`apply_event`,
    /// `emergency_unlock`) so they observe and leave a consistent view
    /// across the repository and the breaker.
    critical_section: Mutex<()>,
}

impl PolicyEngine {
    pub fn new(repository: Repository, breaker: CircuitBreaker) -> Self {
        Self {
            repository,
            breaker: Mutex::new(breaker),
            critical_section: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Apply one lifecycle/payment event. See the module doc for the
    /// ordering guarantees this method relies on.
    pub fn apply_event(&self, payload: &EventPayload) -> Result<ApplyOutcome, EngineError> {
        let _guard = self.critical_section.lock().unwrap();
        let now = Utc::now();

        // 1. Idempotency check precedes everything else: no audit, no
        // command, no state change for a replayed transaction id.
        if let Some(txn) = payload.transaction_id.as_deref().filter(|t| !t.is_empty()) {
            if self.repository.has_txn(txn) {
                tracing::info!(
                    serial = %payload.serial_number,
                    transaction_id = txn,
                    "duplicate event suppressed"
                );
                return Ok(ApplyOutcome::Duplicate {
                    transaction_id: txn.to_string(),
                });
            }
        }

        let current = self
            .repository
            .get_state(&payload.serial_number)
            .unwrap_or(DeviceState::Provisioning);

        let new_state = match transition(current, payload.event_type) {
            Some(s) => s,
            None => {
                tracing::warn!(
                    serial = %payload.serial_number,
                    from = %current,
                    event = %payload.event_type,
                    "invalid transition rejected"
                );
                return Err(EngineError::InvalidTransition {
                    from: current,
                    event: payload.event_type,
                });
            }
        };

        if LOCK_PRODUCING_STATES.contains(&new_state) {
            let mut breaker = self.breaker.lock().unwrap();
            if !breaker.allow_lock(now) {
                tracing::warn!(
                    serial = %payload.serial_number,
                    from = %current,
                    to = %new_state,
                    "circuit breaker open, lock rejected"
                );
                return Err(EngineError::CircuitOpen);
            }
            breaker.record_lock(now);
        }

        self.repository.put_state(&payload.serial_number, new_state);
        self.repository.append_audit(AuditRecord {
            serial_number: payload.serial_number.clone(),
            from_state: current,
            to_state: new_state,
            event: payload.event_type,
            actor: payload.actor.clone(),
            timestamp: now,
            transaction_id: payload.transaction_id.clone(),
        });

        if let Some(command) = state_to_command(new_state) {
            self.repository.enqueue_command(CommandEntry {
                id: Uuid::new_v4(),
                serial_number: payload.serial_number.clone(),
                command,
                payload: policy_template(new_state).restrictions,
                created_at: now,
                acknowledged: false,
            });
        }

        if let Some(txn) = payload.transaction_id.as_deref().filter(|t| !t.is_empty()) {
            self.repository.mark_txn(txn);
        }

        tracing::info!(
            serial = %payload.serial_number,
            from = %current,
            to = %new_state,
            event = %payload.event_type,
            actor = %payload.actor,
            transaction_id = ?payload.transaction_id,
            "transition committed"
        );

        Ok(ApplyOutcome::Transitioned {
            serial_number: payload.serial_number.clone(),
            from_state: current,
            to_state: new_state,
            event: payload.event_type,
        })
    }

    /// The authoritative policy view a DPC enforces for `serial`.
    pub fn get_policy(&self, serial: &str) -> Result<PolicyResponse, EngineError> {
        let state = self.repository.get_state(serial).ok_or(EngineError::NotFound)?;
        let template = policy_template(state);
        Ok(PolicyResponse {
            serial_number: serial.to_string(),
            device_state: state,
            restrictions: template.restrictions,
            lock_screen_message: template.lock_screen_message.to_string(),
            protected_packages: template.protected_packages.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn pending_commands(&self, serial: &str) -> Vec<CommandEntry> {
        self.repository.list_pending_commands(serial)
    }

    pub fn ack_command(&self, id: Uuid) -> Result<(String, CommandType), EngineError> {
        Ok(self.repository.ack_command(id)?)
    }

    pub fn list_devices(&self) -> Vec<(String, DeviceState)> {
        self.repository.list_devices()
    }

    pub fn get_audit(&self, serial: &str) -> Vec<AuditRecord> {
        self.repository.list_audit(serial)
    }

    pub fn delete_device(&self, serial: &str) -> Result<(usize, usize), EngineError> {
        Ok(self.repository.delete_device(serial)?)
    }

    /// Force every soft-locked, hard-locked, or suspended device back to
    /// `ACTIVE`, bypassing the transition table. `STOLEN_LOCKED` and
    /// `DECOMMISSIONED` devices are deliberately excluded.
    pub fn emergency_unlock(&self, reason: &str) -> EmergencyUnlockResult {
        let _guard = self.critical_section.lock().unwrap();
        let now = Utc::now();
        let actor = format!("emergency:{reason}");

        let targets = self.repository.scan_devices_in_states(&EMERGENCY_ELIGIBLE_STATES);
        let mut unlocked_devices = Vec::with_capacity(targets.len());

        for (serial, from_state) in targets {
            self.repository.put_state(&serial, DeviceState::Active);
            self.repository.append_audit(AuditRecord {
                serial_number: serial.clone(),
                from_state,
                to_state: DeviceState::Active,
                event: EventType::AdminReinstate,
                actor: actor.clone(),
                timestamp: now,
                transaction_id: None,
            });
            unlocked_devices.push(serial);
        }

        self.breaker.lock().unwrap().reset();

        tracing::info!(
            unlocked_count = unlocked_devices.len(),
            reason,
            "emergency unlock executed"
        );

        EmergencyUnlockResult {
            unlocked_count: unlocked_devices.len(),
            unlocked_devices,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_breaker::BreakerConfig;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(Repository::new(), CircuitBreaker::new(BreakerConfig::default()))
    }

    fn event(serial: &str, event_type: EventType, txn: Option<&str>) -> EventPayload {
        EventPayload {
            serial_number: serial.to_string(),
            event_type,
            transaction_id: txn.map(|t| t.to_string()),
            actor: "system".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn enrollment_transitions_and_queues_unlock() {
        let engine = engine();
        let outcome = engine
            .apply_event(&event("SN1", EventType::DpcEnrolled, None))
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Transitioned {
                serial_number: "SN1".to_string(),
                from_state: DeviceState::Provisioning,
                to_state: DeviceState::Active,
                event: EventType::DpcEnrolled,
            }
        );
        let pending = engine.pending_commands("SN1");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].command, CommandType::Unlock);
    }

    #[test]
    fn invalid_transition_is_rejected_with_no_side_effects() {
        let engine = engine();
        let err = engine
            .apply_event(&event("SN1", EventType::GraceExpired, None))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTransition {
                from: DeviceState::Provisioning,
                event: EventType::GraceExpired,
            }
        );
        assert!(engine.get_audit("SN1").is_empty());
    }

    #[test]
    fn idempotent_replay_yields_duplicate_and_single_audit_record() {
        let engine = engine();
        engine
            .apply_event(&event("SN1", EventType::DpcEnrolled, None))
            .unwrap();
        let first = engine
            .apply_event(&event("SN1", EventType::PaymentOverdue, Some("T1")))
            .unwrap();
        assert!(matches!(first, ApplyOutcome::Transitioned { .. }));

        let second = engine
            .apply_event(&event("SN1", EventType::PaymentOverdue, Some("T1")))
            .unwrap();
        assert_eq!(
            second,
            ApplyOutcome::Duplicate {
                transaction_id: "T1".to_string()
            }
        );

        let audit = engine.get_audit("SN1");
        assert_eq!(audit.iter().filter(|r| r.transaction_id.as_deref() == Some("T1")).count(), 1);
    }

    #[test]
    fn circuit_trips_after_configured_lock_count() {
        let engine = PolicyEngine::new(
            Repository::new(),
            CircuitBreaker::new(BreakerConfig {
                max_locks_in_window: 3,
                window_seconds: 300,
                cooldown_seconds: 600,
            }),
        );

        for serial in ["SN1", "SN2", "SN3"] {
            engine.apply_event(&event(serial, EventType::DpcEnrolled, None)).unwrap();
            engine.apply_event(&event(serial, EventType::PaymentOverdue, None)).unwrap();
            engine.apply_event(&event(serial, EventType::GraceExpired, None)).unwrap();
        }

        engine.apply_event(&event("SN4", EventType::DpcEnrolled, None)).unwrap();
        engine.apply_event(&event("SN4", EventType::PaymentOverdue, None)).unwrap();
        let err = engine
            .apply_event(&event("SN4", EventType::GraceExpired, None))
            .unwrap_err();
        assert_eq!(err, EngineError::CircuitOpen);
        assert_eq!(engine.get_policy("SN4").unwrap().device_state, DeviceState::GracePeriod);
    }

    #[test]
    fn emergency_unlock_restores_active_and_resets_breaker() {
        let engine = PolicyEngine::new(
            Repository::new(),
            CircuitBreaker::new(BreakerConfig {
                max_locks_in_window: 1,
                window_seconds: 300,
                cooldown_seconds: 600,
            }),
        );
        engine.apply_event(&event("SN1", EventType::DpcEnrolled, None)).unwrap();
        engine.apply_event(&event("SN1", EventType::PaymentOverdue, None)).unwrap();
        engine.apply_event(&event("SN1", EventType::GraceExpired, None)).unwrap();
        assert_eq!(engine.get_policy("SN1").unwrap().device_state, DeviceState::SoftLocked);

        let result = engine.emergency_unlock("test");
        assert_eq!(result.unlocked_count, 1);
        assert_eq!(engine.get_policy("SN1").unwrap().device_state, DeviceState::Active);

        // breaker should be reset: a fresh lock-producing transition elsewhere succeeds.
        engine.apply_event(&event("SN2", EventType::DpcEnrolled, None)).unwrap();
        engine.apply_event(&event("SN2", EventType::PaymentOverdue, None)).unwrap();
        assert!(engine.apply_event(&event("SN2", EventType::GraceExpired, None)).is_ok());
    }

    #[test]
    fn stolen_locked_is_excluded_from_emergency_unlock() {
        let engine = engine();
        engine.apply_event(&event("SN1", EventType::DpcEnrolled, None)).unwrap();
        engine
            .apply_event(&event("SN1", EventType::AdminReportStolen, None))
            .unwrap();
        let result = engine.emergency_unlock("test");
        assert_eq!(result.unlocked_count, 0);
        assert_eq!(engine.get_policy("SN1").unwrap().device_state, DeviceState::StolenLocked);
    }
}
