//! One poll: observe, fuse, update badge and stats, maybe alert.

use std::sync::Arc;

use briefwatch_types::{
    Alert, MonitorEvent, MonitorSettings, Observation, SettingKey, SettingsMap, StatsSnapshot,
    Verdict, fuse,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::extract::SignalExtractor;
use crate::gate::NotificationGate;
use crate::locator::TabLocator;
use crate::services::{Clock, NotificationService, SettingsStore, TabError, TabService};
use crate::state::{PersistedState, persist};

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub observation: Observation,
    pub verdict: Verdict,
    /// An alert was dispatched.
    pub notified: bool,
    pub stats: StatsSnapshot,
}

/// Everything a poll needs. Shared by reference with every spawned cycle.
pub struct PollCycle {
    locator: TabLocator,
    extractor: SignalExtractor,
    gate: NotificationGate,
    store: Arc<dyn SettingsStore>,
    notifier: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<MonitorEvent>,
}

/// Collaborators handed to the engine by the binary.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn SettingsStore>,
    pub tabs: Arc<dyn TabService>,
    pub notifier: Arc<dyn NotificationService>,
    pub clock: Arc<dyn Clock>,
}

impl PollCycle {
    pub fn new(
        settings: &MonitorSettings,
        services: &Services,
        events: broadcast::Sender<MonitorEvent>,
    ) -> Result<Self, TabError> {
        Ok(Self {
            locator: TabLocator::new(Arc::clone(&services.tabs), settings)?,
            extractor: SignalExtractor::new(settings.rules.clone()),
            gate: NotificationGate::new(settings.throttle_window),
            store: Arc::clone(&services.store),
            notifier: Arc::clone(&services.notifier),
            clock: Arc::clone(&services.clock),
            events,
        })
    }

    pub async fn run(&self) -> CycleReport {
        let observation = self.locator.locate_and_observe(&self.extractor).await;
        let verdict = fuse(&observation);
        info!(
            verdict = verdict.kind().as_str(),
            votes = observation.votes(),
            brief_count = verdict.brief_count(),
            "Poll complete"
        );

        self.update_badge(&verdict).await;

        let mut state = PersistedState::load(self.store.as_ref()).await;
        let now_ms = self.clock.now_ms();
        let stats = self.record_stats(&state, &verdict, now_ms).await;

        let notified = self.maybe_notify(&mut state, &verdict, now_ms).await;

        CycleReport {
            observation,
            verdict,
            notified,
            stats,
        }
    }

    async fn update_badge(&self, verdict: &Verdict) {
        let count = verdict.brief_count();
        let badge = (count > 0).then_some(count);
        if let Err(e) = self.notifier.set_badge(badge).await {
            warn!("Badge update failed: {e}");
        }
    }

    async fn record_stats(
        &self,
        state: &PersistedState,
        verdict: &Verdict,
        now_ms: i64,
    ) -> StatsSnapshot {
        let today = self.clock.today();
        let check_count = if state.stats_day.as_deref() == Some(today.as_str()) {
            state.total_checks_today.saturating_add(1)
        } else {
            if state.stats_day.is_some() {
                debug!(day = %today, "New day; resetting check counter");
            }
            1
        };

        let stats = StatsSnapshot {
            brief_count: verdict.brief_count(),
            check_count,
            last_check_time: Some(now_ms),
        };

        let mut values = SettingsMap::new();
        SettingKey::TotalChecksToday.put(&mut values, check_count);
        SettingKey::StatsDay.put(&mut values, today);
        SettingKey::CurrentBriefCount.put(&mut values, stats.brief_count as u64);
        SettingKey::LastCheckTime.put(&mut values, now_ms);
        persist(self.store.as_ref(), values).await;

        // No subscribers is fine.
        let _ = self.events.send(MonitorEvent::StatsUpdate(stats));
        stats
    }

    async fn maybe_notify(
        &self,
        state: &mut PersistedState,
        verdict: &Verdict,
        now_ms: i64,
    ) -> bool {
        if !self.gate.should_notify(verdict, &state.throttle, now_ms) {
            if !verdict.is_none() {
                debug!(
                    last = state.throttle.last_notification_at_ms,
                    "Alert suppressed by throttle"
                );
            }
            return false;
        }
        let Some(alert) = Alert::for_verdict(verdict) else {
            return false;
        };

        match self.notifier.show(alert).await {
            Ok(()) => {
                NotificationGate::record_notified(&mut state.throttle, now_ms);
                let mut values = SettingsMap::new();
                SettingKey::LastNotificationTime.put(&mut values, now_ms);
                persist(self.store.as_ref(), values).await;
                true
            }
            Err(e) => {
                warn!("Alert delivery failed: {e}");
                false
            }
        }
    }
}
