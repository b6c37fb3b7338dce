//! Resolved configuration types shared across crates.
//!
//! Raw TOML deserialization structs (with `Option` fields) stay in
//! `briefwatch-config`. The config loader resolves them into these types at
//! the parse boundary, so core logic never re-applies defaults.

use std::time::Duration;

use url::Url;

pub const DEFAULT_TARGET_URL: &str = "https://www.fiverr.com/briefs/overview/matches";
pub const DEFAULT_TAB_PATTERN: &str = "https://www.fiverr.com/briefs/overview/matches*";

/// Poll interval, always within [`CheckInterval::MIN`, `CheckInterval::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckInterval(Duration);

impl CheckInterval {
    pub const MIN: Duration = Duration::from_secs(30);
    pub const MAX: Duration = Duration::from_secs(600);
    pub const DEFAULT: Self = Self(Duration::from_secs(60));

    /// Clamp `requested` into the allowed range.
    ///
    /// The second element is `true` when the value had to be adjusted.
    #[must_use]
    pub fn clamped(requested: Duration) -> (Self, bool) {
        let value = requested.clamp(Self::MIN, Self::MAX);
        (Self(value), value != requested)
    }

    #[must_use]
    pub fn from_millis(ms: u64) -> (Self, bool) {
        Self::clamped(Duration::from_millis(ms))
    }

    #[must_use]
    pub const fn get(self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0.as_millis() as u64
    }
}

impl Default for CheckInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Selectors and labels the signal extractor looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRules {
    /// CSS selector for heading-like elements that may hold the empty-state text.
    pub empty_state_selector: String,
    /// Any of these substrings marks the "no briefs" state.
    pub empty_state_markers: Vec<String>,
    /// Label of the primary call-to-action button (one per brief).
    pub primary_label: String,
    /// Label of the secondary dismissal button.
    pub secondary_label: String,
}

impl Default for SignalRules {
    fn default() -> Self {
        Self {
            empty_state_selector: r#"h4, h3, h2, [class*="no-brief"], [class*="empty"]"#
                .to_string(),
            empty_state_markers: vec![
                "No new brief matches".to_string(),
                "No briefs available".to_string(),
                "No matches found".to_string(),
            ],
            primary_label: "View brief".to_string(),
            secondary_label: "Not interested".to_string(),
        }
    }
}

/// Bounded waits used when observing through tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackTimings {
    /// Max wait for an existing or fallback tab to answer a snapshot request.
    pub response_timeout: Duration,
    /// Max wait for a fallback tab to report load-complete.
    pub load_timeout: Duration,
    /// Delay after load-complete before injecting the probe.
    pub settle_delay: Duration,
    /// Delay after injection before requesting the snapshot.
    pub inject_delay: Duration,
}

impl Default for FallbackTimings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            load_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            inject_delay: Duration::from_secs(1),
        }
    }
}

/// Fully resolved monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub target_url: Url,
    /// Glob matched against tab URLs (`*` spans any characters).
    pub tab_pattern: String,
    pub default_interval: CheckInterval,
    pub throttle_window: Duration,
    /// Start monitoring on launch when no persisted flag says otherwise.
    pub auto_start: bool,
    pub timings: FallbackTimings,
    pub rules: SignalRules,
}

impl MonitorSettings {
    pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(300);
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            target_url: Url::parse(DEFAULT_TARGET_URL).expect("default target URL is valid"),
            tab_pattern: DEFAULT_TAB_PATTERN.to_string(),
            default_interval: CheckInterval::DEFAULT,
            throttle_window: Self::DEFAULT_THROTTLE_WINDOW,
            auto_start: true,
            timings: FallbackTimings::default(),
            rules: SignalRules::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_within_range_is_untouched() {
        let (interval, adjusted) = CheckInterval::clamped(Duration::from_secs(120));
        assert_eq!(interval.get(), Duration::from_secs(120));
        assert!(!adjusted);
    }

    #[test]
    fn interval_below_minimum_is_raised() {
        let (interval, adjusted) = CheckInterval::from_millis(1_000);
        assert_eq!(interval.get(), CheckInterval::MIN);
        assert!(adjusted);
    }

    #[test]
    fn interval_above_maximum_is_lowered() {
        let (interval, adjusted) = CheckInterval::from_millis(3_600_000);
        assert_eq!(interval.get(), CheckInterval::MAX);
        assert!(adjusted);
    }

    #[test]
    fn defaults_match_monitored_page() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.target_url.as_str(), DEFAULT_TARGET_URL);
        assert_eq!(settings.default_interval.as_millis(), 60_000);
        assert_eq!(settings.throttle_window, Duration::from_millis(300_000));
        assert!(settings.auto_start);
    }
}
