use serde::{Deserialize, Serialize};

/// All lifecycle states a financed device can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Provisioning,
    Active,
    GracePeriod,
    SoftLocked,
    HardLocked,
    Suspended,
    PaidOff,
    StolenLocked,
    Decommissioned,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Active => "ACTIVE",
            Self::GracePeriod => "GRACE_PERIOD",
            Self::SoftLocked => "SOFT_LOCKED",
            Self::HardLocked => "HARD_LOCKED",
            Self::Suspended => "SUSPENDED",
            Self::PaidOff => "PAID_OFF",
            Self::StolenLocked => "STOLEN_LOCKED",
            Self::Decommissioned => "DECOMMISSIONED",
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events accepted by the policy engine. Serialized as the lowercase
/// dotted form used by the billing system, admin console, and DPC
/// (e.g. `"payment.overdue"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "dpc.enrolled")]
    DpcEnrolled,
    #[serde(rename = "payment.received")]
    PaymentReceived,
    #[serde(rename = "payment.overdue")]
    PaymentOverdue,
    #[serde(rename = "payment.completed")]
    PaymentCompleted,
    #[serde(rename = "grace.expired")]
    GraceExpired,
    #[serde(rename = "escalation.timeout")]
    EscalationTimeout,
    #[serde(rename = "admin.suspend")]
    AdminSuspend,
    #[serde(rename = "admin.reinstate")]
    AdminReinstate,
    #[serde(rename = "admin.report_stolen")]
    AdminReportStolen,
    #[serde(rename = "admin.recover")]
    AdminRecover,
    #[serde(rename = "admin.decommission")]
    AdminDecommission,
    #[serde(rename = "provisioning.failed")]
    ProvisioningFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DpcEnrolled => "dpc.enrolled",
            Self::PaymentReceived => "payment.received",
            Self::PaymentOverdue => "payment.overdue",
            Self::PaymentCompleted => "payment.completed",
            Self::GraceExpired => "grace.expired",
            Self::EscalationTimeout => "escalation.timeout",
            Self::AdminSuspend => "admin.suspend",
            Self::AdminReinstate => "admin.reinstate",
            Self::AdminReportStolen => "admin.report_stolen",
            Self::AdminRecover => "admin.recover",
            Self::AdminDecommission => "admin.decommission",
            Self::ProvisioningFailed => "provisioning.failed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actuation commands the DPC executes on its next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Lock,
    Unlock,
    Wipe,
    SetRestrictions,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::Wipe => "WIPE",
            Self::SetRestrictions => "SET_RESTRICTIONS",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
