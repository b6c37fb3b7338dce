//! Collaborator seams: settings storage, browser tabs, notifications, time.
//!
//! Implementations live outside the engine (`briefwatch-browser`, the CLI) or
//! in [`crate::store`]. All async methods return boxed futures so the traits
//! stay object-safe.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use briefwatch_types::{Alert, SettingKey, SettingsMap};
use globset::{Glob, GlobMatcher};
use thiserror::Error;
use url::Url;

/// Boxed future returned by every service method.
pub type ServiceFut<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

// ============================================================================
// Tabs
// ============================================================================

/// Opaque tab identifier assigned by the tab service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub pinned: bool,
}

/// Serialized DOM of a page at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

/// URL glob used to find tabs already showing the target page.
///
/// `*` spans any run of characters, including `/`.
#[derive(Debug, Clone)]
pub struct TabPattern {
    source: String,
    matcher: GlobMatcher,
}

impl TabPattern {
    pub fn new(pattern: &str) -> Result<Self, TabError> {
        let glob = Glob::new(pattern).map_err(|e| TabError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.matcher.is_match(url)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Error)]
pub enum TabError {
    #[error("no page script answered in tab {0}")]
    NoResponder(TabId),
    #[error("tab {0} not found")]
    NotFound(TabId),
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: &'static str, after: Duration },
    #[error("invalid tab pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("tab service unavailable: {0}")]
    Unavailable(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Browser tab operations needed to observe the target page.
pub trait TabService: Send + Sync {
    /// Tabs whose URL matches `pattern`.
    fn query<'a>(&'a self, pattern: &'a TabPattern) -> ServiceFut<'a, Vec<TabInfo>, TabError>;

    /// Ask the page script in `tab` for a snapshot.
    ///
    /// Fails with [`TabError::NoResponder`] when no probe is listening.
    fn request_snapshot<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, PageSnapshot, TabError>;

    fn create<'a>(&'a self, url: &'a Url, active: bool) -> ServiceFut<'a, TabId, TabError>;

    /// Resolve once the tab reports load-complete.
    fn wait_for_load<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError>;

    /// Install the snapshot probe into the tab's page.
    fn inject<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError>;

    fn close<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError>;
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Eventually consistent key-value settings shared with external UIs.
pub trait SettingsStore: Send + Sync {
    /// Values for the requested keys. Missing keys are absent from the map.
    fn get<'a>(&'a self, keys: &'a [SettingKey]) -> ServiceFut<'a, SettingsMap, StoreError>;

    /// Merge `values` into the store.
    fn set(&self, values: SettingsMap) -> ServiceFut<'_, (), StoreError>;
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

pub trait NotificationService: Send + Sync {
    fn show(&self, alert: Alert) -> ServiceFut<'_, (), NotifyError>;

    /// Show `count` on the toolbar badge, or clear it with `None`.
    fn set_badge(&self, count: Option<usize>) -> ServiceFut<'_, (), NotifyError>;
}

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock source for throttling and stats.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    /// Local calendar day of [`Clock::now_ms`], formatted `YYYY-MM-DD`.
    fn today(&self) -> String {
        use chrono::TimeZone;

        chrono::Local
            .timestamp_millis_opt(self.now_ms())
            .single()
            .map(|dt| dt.date_naive().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
