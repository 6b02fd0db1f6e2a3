mod policy;
mod records;
mod states;
mod transitions;

pub use policy::{policy_template, PolicyTemplate, Restrictions};
pub use records::{
    validate_serial, AuditRecord, CommandEntry, EventPayload, PolicyResponse, SchemaViolation,
};
pub use states::{CommandType, DeviceState, EventType};
pub use transitions::{state_to_command, transition};
