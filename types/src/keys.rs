//! Keys of the shared settings store.
//!
//! The store is an eventually-consistent string-keyed map shared with
//! external UIs, so the key spellings are part of the interface.

use serde_json::{Map, Value};

/// Map read from / written to a settings store.
pub type SettingsMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Monitoring enabled flag (bool).
    IsEnabled,
    /// Poll interval in milliseconds (u64).
    CheckInterval,
    /// Epoch millis of the last dispatched alert (i64).
    LastNotificationTime,
    /// Poll cycles completed today (u64).
    TotalChecksToday,
    /// Brief count from the most recent poll (u64).
    CurrentBriefCount,
    /// Epoch millis of the most recent poll (i64).
    LastCheckTime,
    /// Local date (`YYYY-MM-DD`) that `TotalChecksToday` belongs to.
    StatsDay,
}

impl SettingKey {
    pub const ALL: [Self; 7] = [
        Self::IsEnabled,
        Self::CheckInterval,
        Self::LastNotificationTime,
        Self::TotalChecksToday,
        Self::CurrentBriefCount,
        Self::LastCheckTime,
        Self::StatsDay,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IsEnabled => "isEnabled",
            Self::CheckInterval => "checkInterval",
            Self::LastNotificationTime => "lastNotificationTime",
            Self::TotalChecksToday => "totalChecksToday",
            Self::CurrentBriefCount => "currentBriefCount",
            Self::LastCheckTime => "lastCheckTime",
            Self::StatsDay => "statsDay",
        }
    }

    /// Insert `value` under this key.
    pub fn put(self, map: &mut SettingsMap, value: impl Into<Value>) {
        map.insert(self.as_str().to_string(), value.into());
    }

    #[must_use]
    pub fn read_bool(self, map: &SettingsMap) -> Option<bool> {
        map.get(self.as_str()).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn read_u64(self, map: &SettingsMap) -> Option<u64> {
        map.get(self.as_str()).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn read_i64(self, map: &SettingsMap) -> Option<i64> {
        map.get(self.as_str()).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn read_str(self, map: &SettingsMap) -> Option<&str> {
        map.get(self.as_str()).and_then(Value::as_str)
    }
}
