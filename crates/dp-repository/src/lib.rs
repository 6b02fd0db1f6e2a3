//! In-memory device/audit/command store behind a single synchronous lock.
//!
//! The lock is `std::sync::Mutex`, not an async-aware lock: the critical
//! section that uses it never awaits, so there is nothing for an
//! async-aware lock to buy here, only liveness hazards to avoid.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use dp_schemas::{AuditRecord, CommandEntry, CommandType, DeviceState};
use uuid::Uuid;

/// Returned when a lookup by serial or command id finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("not found")
    }
}

impl std::error::Error for NotFound {}

#[derive(Default)]
struct Inner {
    devices: HashMap<String, DeviceState>,
    audit: HashMap<String, Vec<AuditRecord>>,
    commands: HashMap<String, Vec<CommandEntry>>,
    command_owner: HashMap<Uuid, String>,
    processed_txns: HashSet<String>,
}

/// The process-wide store of device state, audit history, the command
/// queue, and processed transaction ids. All operations are linearizable
/// with respect to one another because they all take the same lock.
#[derive(Default)]
pub struct Repository {
    inner: Mutex<Inner>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_state(&self, serial: &str) -> Option<DeviceState> {
        self.inner.lock().unwrap().devices.get(serial).copied()
    }

    pub fn put_state(&self, serial: &str, state: DeviceState) {
        self.inner
            .lock()
            .unwrap()
            .devices
            .insert(serial.to_string(), state);
    }

    /// Removes the device's state and all of its audit/command history.
    /// Returns the counts of removed audit records and removed commands.
    pub fn delete_device(&self, serial: &str) -> Result<(usize, usize), NotFound> {
        let mut guard = self.inner.lock().unwrap();
        if guard.devices.remove(serial).is_none() {
            return Err(NotFound);
        }
        let removed_audit = guard.audit.remove(serial).map(|v| v.len()).unwrap_or(0);
        let removed_commands = guard
            .commands
            .remove(serial)
            .map(|entries| {
                for entry in &entries {
                    guard.command_owner.remove(&entry.id);
                }
                entries.len()
            })
            .unwrap_or(0);
        Ok((removed_audit, removed_commands))
    }

    pub fn append_audit(&self, record: AuditRecord) {
        self.inner
            .lock()
            .unwrap()
            .audit
            .entry(record.serial_number.clone())
            .or_default()
            .push(record);
    }

    pub fn list_audit(&self, serial: &str) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .unwrap()
            .audit
            .get(serial)
            .cloned()
            .unwrap_or_default()
    }

    pub fn enqueue_command(&self, entry: CommandEntry) {
        let mut guard = self.inner.lock().unwrap();
        guard.command_owner.insert(entry.id, entry.serial_number.clone());
        guard
            .commands
            .entry(entry.serial_number.clone())
            .or_default()
            .push(entry);
    }

    pub fn list_pending_commands(&self, serial: &str) -> Vec<CommandEntry> {
        self.inner
            .lock()
            .unwrap()
            .commands
            .get(serial)
            .map(|entries| entries.iter().filter(|e| !e.acknowledged).cloned().collect())
            .unwrap_or_default()
    }

    /// Marks a command acknowledged. Idempotent: acking an already-acked
    /// id succeeds and returns that command's serial and type again.
    pub fn ack_command(&self, id: Uuid) -> Result<(String, CommandType), NotFound> {
        let mut guard = self.inner.lock().unwrap();
        let serial = guard.command_owner.get(&id).cloned().ok_or(NotFound)?;
        let entries = guard.commands.get_mut(&serial).ok_or(NotFound)?;
        let entry = entries.iter_mut().find(|e| e.id == id).ok_or(NotFound)?;
        entry.acknowledged = true;
        Ok((serial, entry.command))
    }

    pub fn mark_txn(&self, transaction_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .processed_txns
            .insert(transaction_id.to_string());
    }

    pub fn has_txn(&self, transaction_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .processed_txns
            .contains(transaction_id)
    }

    pub fn list_devices(&self) -> Vec<(String, DeviceState)> {
        let guard = self.inner.lock().unwrap();
        let mut devices: Vec<_> = guard
            .devices
            .iter()
            .map(|(serial, state)| (serial.clone(), *state))
            .collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));
        devices
    }

    pub fn scan_devices_in_states(&self, states: &[DeviceState]) -> Vec<(String, DeviceState)> {
        let guard = self.inner.lock().unwrap();
        let mut devices: Vec<_> = guard
            .devices
            .iter()
            .filter(|(_, state)| states.contains(state))
            .map(|(serial, state)| (serial.clone(), *state))
            .collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));
        devices
    }
}

/// Helper for callers constructing an `AuditRecord` at the current instant.
pub fn now_utc() -> chrono::DateTime<Utc> {
    Utc::now()
}
