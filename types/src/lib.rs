//! Core domain types for briefwatch.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod alert;
mod command;
mod keys;
mod observation;
mod settings;

pub use alert::{Alert, AlertPriority};
pub use command::{CommandResponse, MonitorCommand, MonitorEvent, MonitorStatus, StatsSnapshot};
pub use keys::{SettingKey, SettingsMap};
pub use observation::{Observation, Verdict, VerdictKind, fuse};
pub use settings::{
    CheckInterval, DEFAULT_TAB_PATTERN, DEFAULT_TARGET_URL, FallbackTimings, MonitorSettings,
    SignalRules,
};
