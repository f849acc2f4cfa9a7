//! Alarm registration and scheduling

pub mod command;
pub mod fire;
pub mod scheduler;

pub use command::{ReportCommand, decode_commands, encode_commands, parse_commands};
pub use fire::{AlarmDefinition, AlarmRequest, FireSpec};
pub use scheduler::{AlarmScheduler, FiredAlarm};
