//! The static `(state, event) -> state` transition table and the
//! state -> command map. Both are small and fixed, so both are plain
//! `match` expressions rather than a runtime-built map.

use crate::states::{CommandType, DeviceState, EventType};

/// Look up the legal next state for `(from, event)`.
///
/// `admin.decommission` is not a row in the per-state table below — it is
/// the universal terminator, consulted only after the normal lookup comes
/// up empty (see the table in the spec's §9 design notes).
pub fn transition(from: DeviceState, event: EventType) -> Option<DeviceState> {
    if let Some(to) = lookup(from, event) {
        return Some(to);
    }
    if event == EventType::AdminDecommission {
        return Some(DeviceState::Decommissioned);
    }
    None
}

fn lookup(from: DeviceState, event: EventType) -> Option<DeviceState> {
    use DeviceState::*;
    use EventType::*;

    match (from, event) {
        (Provisioning, DpcEnrolled) => Some(Active),
        (Provisioning, ProvisioningFailed) => Some(Decommissioned),

        (Active, PaymentOverdue) => Some(GracePeriod),
        (Active, PaymentCompleted) => Some(PaidOff),
        (Active, AdminSuspend) => Some(Suspended),
        (Active, AdminReportStolen) => Some(StolenLocked),

        (GracePeriod, PaymentReceived) => Some(Active),
        (GracePeriod, GraceExpired) => Some(SoftLocked),

        (SoftLocked, PaymentReceived) => Some(Active),
        (SoftLocked, EscalationTimeout) => Some(HardLocked),

        (HardLocked, PaymentReceived) => Some(Active),
        (HardLocked, AdminSuspend) => Some(Suspended),
        (HardLocked, AdminReportStolen) => Some(StolenLocked),

        (Suspended, AdminReinstate) => Some(Active),

        (StolenLocked, AdminRecover) => Some(Suspended),

        _ => None,
    }
}

/// The command the DPC must execute after a device enters `state`.
/// `None` means no command is emitted on entry (e.g. `GRACE_PERIOD` is a
/// warning-only state).
pub fn state_to_command(state: DeviceState) -> Option<CommandType> {
    use DeviceState::*;

    match state {
        Active | PaidOff => Some(CommandType::Unlock),
        SoftLocked | HardLocked | Suspended | StolenLocked => Some(CommandType::Lock),
        Decommissioned => Some(CommandType::Wipe),
        GracePeriod | Provisioning => None,
    }
}
