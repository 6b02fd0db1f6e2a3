use serde::{Deserialize, Serialize};

use crate::states::DeviceState;

/// The restrictions a DPC must enforce. Modeled as a fixed record rather
/// than the reference's free-form dict, since the key set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Restrictions {
    pub no_usb: bool,
    pub no_camera: bool,
    pub no_install_apps: bool,
}

/// Static per-state policy: the restrictions, lock-screen message, and
/// protected-package list a device in this state is governed by.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTemplate {
    pub restrictions: Restrictions,
    pub lock_screen_message: &'static str,
    pub protected_packages: &'static [&'static str],
}

const FINTECH_APP: &[&str] = &["com.example.fintechapp"];
const NONE_PROTECTED: &[&str] = &[];

const PROVISIONING: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: true,
        no_camera: false,
        no_install_apps: true,
    },
    lock_screen_message: "Setup in progress.",
    protected_packages: FINTECH_APP,
};

const ACTIVE: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: false,
        no_camera: false,
        no_install_apps: false,
    },
    lock_screen_message: "",
    protected_packages: FINTECH_APP,
};

const GRACE_PERIOD: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: false,
        no_camera: false,
        no_install_apps: false,
    },
    lock_screen_message: "Payment overdue. Please pay to avoid restrictions.",
    protected_packages: FINTECH_APP,
};

const SOFT_LOCKED: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: true,
        no_camera: true,
        no_install_apps: true,
    },
    lock_screen_message: "Device restricted due to missed payment. Pay now to restore access.",
    protected_packages: FINTECH_APP,
};

const HARD_LOCKED: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: true,
        no_camera: true,
        no_install_apps: true,
    },
    lock_screen_message: "Device locked. Contact support or make payment to unlock.",
    protected_packages: FINTECH_APP,
};

const SUSPENDED: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: true,
        no_camera: true,
        no_install_apps: true,
    },
    lock_screen_message: "Device suspended. Contact support.",
    protected_packages: FINTECH_APP,
};

const STOLEN_LOCKED: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: true,
        no_camera: true,
        no_install_apps: true,
    },
    lock_screen_message: "This device has been reported. Contact authorities.",
    protected_packages: FINTECH_APP,
};

const PAID_OFF: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: false,
        no_camera: false,
        no_install_apps: false,
    },
    lock_screen_message: "",
    protected_packages: NONE_PROTECTED,
};

const DECOMMISSIONED: PolicyTemplate = PolicyTemplate {
    restrictions: Restrictions {
        no_usb: false,
        no_camera: false,
        no_install_apps: false,
    },
    lock_screen_message: "Device decommissioned.",
    protected_packages: NONE_PROTECTED,
};

/// The compile-time policy template for `state`.
pub fn policy_template(state: DeviceState) -> &'static PolicyTemplate {
    match state {
        DeviceState::Provisioning => &PROVISIONING,
        DeviceState::Active => &ACTIVE,
        DeviceState::GracePeriod => &GRACE_PERIOD,
        DeviceState::SoftLocked => &SOFT_LOCKED,
        DeviceState::HardLocked => &HARD_LOCKED,
        DeviceState::Suspended => &SUSPENDED,
        DeviceState::PaidOff => &PAID_OFF,
        DeviceState::StolenLocked => &STOLEN_LOCKED,
        DeviceState::Decommissioned => &DECOMMISSIONED,
    }
}
