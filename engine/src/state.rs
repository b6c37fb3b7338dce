//! Typed view over the persisted settings.
//!
//! Store failures never abort a poll: reads fall back to built-in defaults and
//! writes are logged and dropped.

use briefwatch_types::{CheckInterval, SettingKey, SettingsMap, StatsSnapshot};
use tracing::warn;

use crate::gate::ThrottleState;
use crate::services::SettingsStore;

/// Persisted monitoring and stats values as of one read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedState {
    /// `None` on first run.
    pub enabled: Option<bool>,
    /// Stored interval in millis, unclamped.
    pub interval_ms: Option<u64>,
    pub throttle: ThrottleState,
    pub total_checks_today: u64,
    pub stats_day: Option<String>,
    pub current_brief_count: u64,
    pub last_check_time: Option<i64>,
}

impl PersistedState {
    #[must_use]
    pub fn from_map(map: &SettingsMap) -> Self {
        Self {
            enabled: SettingKey::IsEnabled.read_bool(map),
            interval_ms: SettingKey::CheckInterval.read_u64(map),
            throttle: ThrottleState {
                last_notification_at_ms: SettingKey::LastNotificationTime
                    .read_i64(map)
                    .unwrap_or(0),
            },
            total_checks_today: SettingKey::TotalChecksToday.read_u64(map).unwrap_or(0),
            stats_day: SettingKey::StatsDay.read_str(map).map(str::to_string),
            current_brief_count: SettingKey::CurrentBriefCount.read_u64(map).unwrap_or(0),
            last_check_time: SettingKey::LastCheckTime.read_i64(map),
        }
    }

    /// Read every key, or defaults when the store fails.
    pub async fn load(store: &dyn SettingsStore) -> Self {
        match store.get(&SettingKey::ALL).await {
            Ok(map) => Self::from_map(&map),
            Err(e) => {
                warn!("Settings read failed; using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Stored interval clamped into range, or `default`.
    #[must_use]
    pub fn interval_or(&self, default: CheckInterval) -> CheckInterval {
        self.interval_ms
            .map_or(default, |ms| CheckInterval::from_millis(ms).0)
    }

    /// Stats as last written by a poll cycle. Counts from a previous day read
    /// as zero.
    #[must_use]
    pub fn stats(&self, today: &str) -> StatsSnapshot {
        let check_count = if self.stats_day.as_deref() == Some(today) {
            self.total_checks_today
        } else {
            0
        };
        StatsSnapshot {
            brief_count: usize::try_from(self.current_brief_count).unwrap_or(usize::MAX),
            check_count,
            last_check_time: self.last_check_time,
        }
    }
}

/// Current `isEnabled` flag. A failed read keeps monitoring alive.
pub async fn read_enabled(store: &dyn SettingsStore) -> bool {
    match store.get(&[SettingKey::IsEnabled]).await {
        Ok(map) => SettingKey::IsEnabled.read_bool(&map).unwrap_or(true),
        Err(e) => {
            warn!("Failed to read isEnabled; assuming enabled: {e}");
            true
        }
    }
}

/// Best-effort write.
pub async fn persist(store: &dyn SettingsStore, values: SettingsMap) {
    if let Err(e) = store.set(values).await {
        warn!("Settings write failed: {e}");
    }
}

/// Best-effort single-key write.
pub async fn persist_one(
    store: &dyn SettingsStore,
    key: SettingKey,
    value: impl Into<serde_json::Value>,
) {
    let mut values = SettingsMap::new();
    key.put(&mut values, value);
    persist(store, values).await;
}
