//! Fakes shared by the engine integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use briefwatch_engine::{
    Clock, MemorySettingsStore, NotificationService, NotifyError, PageSnapshot, ServiceFut,
    Services, SettingsStore, StoreError, TabError, TabId, TabInfo, TabPattern, TabService,
};
use briefwatch_types::{Alert, MonitorSettings, SettingKey, SettingsMap};
use url::Url;

pub const TARGET: &str = "https://www.fiverr.com/briefs/overview/matches";

/// Marker present, no buttons.
pub const EMPTY_PAGE: &str = r"<html><body>
    <h4>No new brief matches</h4>
</body></html>";

/// Marker absent, three primary buttons, secondary present.
pub const THREE_BRIEFS_PAGE: &str = r#"<html><body>
    <div class="brief"><button aria-label="View brief">View brief</button><button>Not interested</button></div>
    <div class="brief"><button aria-label="View brief">View brief</button><button>Not interested</button></div>
    <div class="brief"><button aria-label="View brief">View brief</button><button>Not interested</button></div>
</body></html>"#;

/// Marker absent, no buttons at all.
pub const LOADING_PAGE: &str = r"<html><body>
    <div class='spinner'>Loading</div>
</body></html>";

pub const T0: i64 = 1_700_000_000_000;

// ============================================================================
// Tabs
// ============================================================================

#[derive(Debug, Default)]
pub struct TabsState {
    /// Existing tabs and the page each serves (`None` = no probe listening).
    pub existing: Vec<(TabInfo, Option<String>)>,
    /// Page served by fallback tabs once the probe is injected.
    pub fallback_page: Option<String>,
    pub fail_create: bool,
    pub fail_load: bool,
    pub hang_load: bool,
    pub fail_inject: bool,
    pub fail_snapshot: bool,
    /// Delay before existing tabs answer.
    pub snapshot_delay: Duration,

    pub created: Vec<(TabId, String, bool)>,
    pub injected: Vec<TabId>,
    pub closed: Vec<TabId>,
    pub snapshot_requests: Vec<TabId>,
    next_id: u32,
}

#[derive(Debug, Default)]
pub struct FakeTabs {
    pub state: Mutex<TabsState>,
}

impl FakeTabs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_existing(&self, id: &str, url: &str, pinned: bool, page: Option<&str>) {
        self.state.lock().unwrap().existing.push((
            TabInfo {
                id: TabId::new(id),
                url: url.to_string(),
                pinned,
            },
            page.map(str::to_string),
        ));
    }

    pub fn serve_fallback(&self, page: &str) {
        self.state.lock().unwrap().fallback_page = Some(page.to_string());
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut TabsState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn created_count(&self) -> usize {
        self.with(|s| s.created.len())
    }

    pub fn closed(&self) -> Vec<TabId> {
        self.with(|s| s.closed.clone())
    }

    fn is_fallback(state: &TabsState, tab: &TabId) -> bool {
        state.created.iter().any(|(id, _, _)| id == tab)
    }
}

impl TabService for FakeTabs {
    fn query<'a>(&'a self, pattern: &'a TabPattern) -> ServiceFut<'a, Vec<TabInfo>, TabError> {
        Box::pin(async move {
            Ok(self.with(|s| {
                s.existing
                    .iter()
                    .filter(|(info, _)| pattern.matches(&info.url))
                    .map(|(info, _)| info.clone())
                    .collect()
            }))
        })
    }

    fn request_snapshot<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, PageSnapshot, TabError> {
        Box::pin(async move {
            let delay = self.with(|s| {
                s.snapshot_requests.push(tab.clone());
                if s.existing.iter().any(|(info, _)| &info.id == tab) {
                    s.snapshot_delay
                } else {
                    Duration::ZERO
                }
            });
            tokio::time::sleep(delay).await;

            self.with(|s| {
                if let Some((info, page)) = s.existing.iter().find(|(info, _)| &info.id == tab) {
                    return page
                        .clone()
                        .map(|html| PageSnapshot {
                            url: info.url.clone(),
                            html,
                        })
                        .ok_or_else(|| TabError::NoResponder(tab.clone()));
                }
                if Self::is_fallback(s, tab)
                    && s.injected.contains(tab)
                    && !s.fail_snapshot
                    && let Some(html) = s.fallback_page.clone()
                {
                    return Ok(PageSnapshot {
                        url: TARGET.to_string(),
                        html,
                    });
                }
                Err(TabError::NoResponder(tab.clone()))
            })
        })
    }

    fn create<'a>(&'a self, url: &'a Url, active: bool) -> ServiceFut<'a, TabId, TabError> {
        Box::pin(async move {
            self.with(|s| {
                if s.fail_create {
                    return Err(TabError::Unavailable("browser gone".to_string()));
                }
                s.next_id += 1;
                let id = TabId::new(format!("fallback-{}", s.next_id));
                s.created.push((id.clone(), url.to_string(), active));
                Ok(id)
            })
        })
    }

    fn wait_for_load<'a>(&'a self, _tab: &'a TabId) -> ServiceFut<'a, (), TabError> {
        Box::pin(async move {
            let (fail, hang) = self.with(|s| (s.fail_load, s.hang_load));
            if hang {
                std::future::pending::<()>().await;
            }
            if fail {
                return Err(TabError::Protocol("navigation failed".to_string()));
            }
            Ok(())
        })
    }

    fn inject<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError> {
        Box::pin(async move {
            self.with(|s| {
                if s.fail_inject {
                    return Err(TabError::Protocol("script blocked".to_string()));
                }
                s.injected.push(tab.clone());
                Ok(())
            })
        })
    }

    fn close<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError> {
        Box::pin(async move {
            self.with(|s| s.closed.push(tab.clone()));
            Ok(())
        })
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeNotifier {
    pub alerts: Mutex<Vec<Alert>>,
    pub badges: Mutex<Vec<Option<usize>>>,
    pub fail: AtomicBool,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn last_badge(&self) -> Option<Option<usize>> {
        self.badges.lock().unwrap().last().copied()
    }
}

impl NotificationService for FakeNotifier {
    fn show(&self, alert: Alert) -> ServiceFut<'_, (), NotifyError> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Delivery("host unavailable".to_string()));
            }
            self.alerts.lock().unwrap().push(alert);
            Ok(())
        })
    }

    fn set_badge(&self, count: Option<usize>) -> ServiceFut<'_, (), NotifyError> {
        Box::pin(async move {
            self.badges.lock().unwrap().push(count);
            Ok(())
        })
    }
}

// ============================================================================
// Clock and stores
// ============================================================================

#[derive(Debug)]
pub struct FakeClock {
    now: AtomicI64,
    day: Mutex<String>,
}

impl FakeClock {
    pub fn new(now_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now_ms),
            day: Mutex::new("2026-10-16".to_string()),
        })
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn set_day(&self, day: &str) {
        *self.day.lock().unwrap() = day.to_string();
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn today(&self) -> String {
        self.day.lock().unwrap().clone()
    }
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub struct BrokenStore;

impl SettingsStore for BrokenStore {
    fn get<'a>(&'a self, _keys: &'a [SettingKey]) -> ServiceFut<'a, SettingsMap, StoreError> {
        Box::pin(async { Err(StoreError::Unavailable("disk on fire".to_string())) })
    }

    fn set(&self, _values: SettingsMap) -> ServiceFut<'_, (), StoreError> {
        Box::pin(async { Err(StoreError::Unavailable("disk on fire".to_string())) })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub store: Arc<MemorySettingsStore>,
    pub tabs: Arc<FakeTabs>,
    pub notifier: Arc<FakeNotifier>,
    pub clock: Arc<FakeClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemorySettingsStore::new()),
            tabs: FakeTabs::new(),
            notifier: FakeNotifier::new(),
            clock: FakeClock::new(T0),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            store: self.store.clone(),
            tabs: self.tabs.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings::default()
    }

    pub fn stored(&self, key: SettingKey) -> Option<serde_json::Value> {
        self.store.snapshot().get(key.as_str()).cloned()
    }

    pub async fn seed(&self, key: SettingKey, value: impl Into<serde_json::Value>) {
        let mut values = SettingsMap::new();
        key.put(&mut values, value);
        self.store.set(values).await.unwrap();
    }
}
