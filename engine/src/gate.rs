//! Notification throttling.

use std::time::Duration;

use briefwatch_types::Verdict;

/// When the last alert was actually dispatched (epoch millis, 0 = never).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleState {
    pub last_notification_at_ms: i64,
}

/// Allows at most one alert per throttle window. Suppressed alerts are
/// dropped, not queued.
#[derive(Debug, Clone, Copy)]
pub struct NotificationGate {
    window_ms: i64,
}

impl NotificationGate {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// True when `verdict` is not `none` and strictly more than the window has
    /// elapsed since the last dispatched alert.
    #[must_use]
    pub fn should_notify(&self, verdict: &Verdict, throttle: &ThrottleState, now_ms: i64) -> bool {
        if verdict.is_none() {
            return false;
        }
        now_ms.saturating_sub(throttle.last_notification_at_ms) > self.window_ms
    }

    /// Record a dispatched alert. Call only after delivery succeeded.
    pub fn record_notified(throttle: &mut ThrottleState, now_ms: i64) {
        throttle.last_notification_at_ms = now_ms;
    }
}
