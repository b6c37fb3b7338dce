//! Message-bus vocabulary: commands an external UI can send to the monitor,
//! the responses it gets back, and the events the monitor broadcasts.
//!
//! The wire shape follows the `{"action": ...}` convention so JSON clients can
//! talk to the daemon without a schema of their own.

use serde::{Deserialize, Serialize};

/// Closed set of commands accepted by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum MonitorCommand {
    StartMonitoring,
    StopMonitoring,
    GetMonitoringStatus,
    /// Run one poll cycle now (dropped if a cycle is already in flight).
    CheckBriefs,
    /// Persist a new poll interval and re-arm the timer if running.
    SetInterval {
        #[serde(rename = "intervalMs")]
        interval_ms: u64,
    },
    /// Open the monitored page in a focused tab (notification click).
    OpenTarget,
}

impl MonitorCommand {
    /// Parse the short keyword form used on interactive consoles.
    ///
    /// Accepts `start`, `stop`, `status`, `check`, `open`, and
    /// `interval <seconds>`.
    #[must_use]
    pub fn parse_keyword(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let head = parts.next()?.to_ascii_lowercase();
        let command = match head.as_str() {
            "start" => Self::StartMonitoring,
            "stop" => Self::StopMonitoring,
            "status" => Self::GetMonitoringStatus,
            "check" => Self::CheckBriefs,
            "open" => Self::OpenTarget,
            "interval" => {
                let seconds: u64 = parts.next()?.parse().ok()?;
                Self::SetInterval {
                    interval_ms: seconds.saturating_mul(1000),
                }
            }
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(command)
    }

    /// Parse either a JSON command object or the keyword form.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            serde_json::from_str(trimmed).ok()
        } else {
            Self::parse_keyword(trimmed)
        }
    }
}

/// Counters shown to the user after each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub brief_count: usize,
    pub check_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<i64>,
}

/// Current scheduler state as reported over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub is_monitoring: bool,
    pub interval_ms: u64,
    pub check_in_flight: bool,
    pub stats: StatsSnapshot,
}

/// Reply to a [`MonitorCommand`].
///
/// Failures are reported through `success = false` and an optional
/// description; a command never terminates the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MonitorStatus>,
}

impl CommandResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(status: MonitorStatus) -> Self {
        Self {
            success: true,
            error: None,
            status: Some(status),
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            status: None,
        }
    }
}

/// Events broadcast to every bus subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum MonitorEvent {
    /// Emitted after each completed poll cycle.
    StatsUpdate(StatsSnapshot),
    /// Emitted on every Idle/Active transition.
    MonitoringChanged { running: bool },
}
