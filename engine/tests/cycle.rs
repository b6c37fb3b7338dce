//! Poll cycle behaviour end to end against fake collaborators.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use briefwatch_engine::{PollCycle, Services};
use briefwatch_types::{Alert, AlertPriority, MonitorEvent, SettingKey, StatsSnapshot, VerdictKind};
use common::{BrokenStore, EMPTY_PAGE, Harness, LOADING_PAGE, T0, TARGET, THREE_BRIEFS_PAGE};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;

fn cycle(h: &Harness) -> (PollCycle, broadcast::Receiver<MonitorEvent>) {
    let (tx, rx) = broadcast::channel(16);
    let cycle = PollCycle::new(&h.settings(), &h.services(), tx).expect("valid settings");
    (cycle, rx)
}

fn harness_showing(page: &str) -> Harness {
    let h = Harness::new();
    h.tabs.add_existing("tab-1", TARGET, false, Some(page));
    h
}

#[tokio::test(start_paused = true)]
async fn empty_page_yields_no_alert_and_clears_badge() {
    let h = harness_showing(EMPTY_PAGE);
    let (cycle, _rx) = cycle(&h);

    let report = cycle.run().await;

    assert_eq!(report.verdict.kind(), VerdictKind::None);
    assert_eq!(report.verdict.brief_count(), 0);
    assert!(!report.notified);
    assert!(h.notifier.alerts().is_empty());
    assert_eq!(h.notifier.last_badge(), Some(None));
    assert_eq!(h.tabs.created_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn three_briefs_confirmed_and_announced() {
    let h = harness_showing(THREE_BRIEFS_PAGE);
    let (cycle, _rx) = cycle(&h);

    let report = cycle.run().await;

    assert_eq!(report.verdict.kind(), VerdictKind::Confirmed);
    assert_eq!(report.verdict.brief_count(), 3);
    assert!(report.notified);
    assert_eq!(
        h.notifier.alerts(),
        vec![Alert {
            title: "New Fiverr Briefs Available!".to_string(),
            message: "Hurry! You have 3 new briefs!".to_string(),
            priority: AlertPriority::High,
        }]
    );
    assert_eq!(h.notifier.last_badge(), Some(Some(3)));
    assert_eq!(h.stored(SettingKey::LastNotificationTime), Some(json!(T0)));
}

#[tokio::test(start_paused = true)]
async fn single_signal_is_potential_with_generic_alert() {
    let h = harness_showing(LOADING_PAGE);
    let (cycle, _rx) = cycle(&h);

    let report = cycle.run().await;

    assert_eq!(report.observation.votes(), 1);
    assert_eq!(report.verdict.kind(), VerdictKind::Potential);
    assert_eq!(report.verdict.brief_count(), 0);
    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, Alert::POTENTIAL_TITLE);
    assert_eq!(alerts[0].message, Alert::POTENTIAL_MESSAGE);
    assert_eq!(alerts[0].priority, AlertPriority::Normal);
    assert_eq!(h.notifier.last_badge(), Some(None));
}

#[tokio::test(start_paused = true)]
async fn throttle_window_is_strict() {
    let h = harness_showing(THREE_BRIEFS_PAGE);
    h.seed(SettingKey::LastNotificationTime, T0).await;
    let (cycle, _rx) = cycle(&h);

    h.clock.set(T0 + 299_999);
    assert!(!cycle.run().await.notified);
    h.clock.set(T0 + 300_000);
    assert!(!cycle.run().await.notified);
    assert!(h.notifier.alerts().is_empty());

    h.clock.set(T0 + 300_001);
    assert!(cycle.run().await.notified);
    assert_eq!(
        h.stored(SettingKey::LastNotificationTime),
        Some(json!(T0 + 300_001))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_does_not_consume_the_window() {
    let h = harness_showing(THREE_BRIEFS_PAGE);
    let (cycle, _rx) = cycle(&h);

    h.notifier.fail.store(true, Ordering::SeqCst);
    assert!(!cycle.run().await.notified);
    assert_eq!(h.stored(SettingKey::LastNotificationTime), None);

    h.notifier.fail.store(false, Ordering::SeqCst);
    h.clock.set(T0 + 1_000);
    assert!(cycle.run().await.notified);
}

#[tokio::test(start_paused = true)]
async fn stats_accumulate_within_a_day_and_reset_on_the_next() {
    let h = harness_showing(EMPTY_PAGE);
    h.seed(SettingKey::TotalChecksToday, 5_u64).await;
    h.seed(SettingKey::StatsDay, "2026-10-16").await;
    let (cycle, _rx) = cycle(&h);

    assert_eq!(cycle.run().await.stats.check_count, 6);

    h.clock.set_day("2026-10-17");
    h.clock.set(T0 + 60_000);
    let stats = cycle.run().await.stats;
    assert_eq!(
        stats,
        StatsSnapshot {
            brief_count: 0,
            check_count: 1,
            last_check_time: Some(T0 + 60_000),
        }
    );
    assert_eq!(h.stored(SettingKey::StatsDay), Some(json!("2026-10-17")));
    assert_eq!(h.stored(SettingKey::TotalChecksToday), Some(json!(1)));
    assert_eq!(h.stored(SettingKey::LastCheckTime), Some(json!(T0 + 60_000)));
}

#[tokio::test(start_paused = true)]
async fn stats_update_is_broadcast() {
    let h = harness_showing(THREE_BRIEFS_PAGE);
    let (cycle, mut rx) = cycle(&h);

    cycle.run().await;

    assert_eq!(
        rx.try_recv().unwrap(),
        MonitorEvent::StatsUpdate(StatsSnapshot {
            brief_count: 3,
            check_count: 1,
            last_check_time: Some(T0),
        })
    );
    assert_eq!(h.stored(SettingKey::CurrentBriefCount), Some(json!(3)));
}

#[tokio::test(start_paused = true)]
async fn broken_store_falls_back_to_defaults() {
    let h = harness_showing(THREE_BRIEFS_PAGE);
    let services = Services {
        store: Arc::new(BrokenStore),
        ..h.services()
    };
    let (tx, _rx) = broadcast::channel(4);
    let cycle = PollCycle::new(&h.settings(), &services, tx).unwrap();

    let report = cycle.run().await;

    assert_eq!(report.verdict.kind(), VerdictKind::Confirmed);
    assert_eq!(report.stats.check_count, 1);
    assert!(report.notified);
}

#[tokio::test(start_paused = true)]
async fn unreachable_page_is_neutral() {
    let h = Harness::new();
    h.tabs.with(|s| s.fail_create = true);
    let (cycle, _rx) = cycle(&h);

    let report = cycle.run().await;

    assert_eq!(report.verdict.kind(), VerdictKind::None);
    assert!(!report.notified);
    assert_eq!(report.stats.check_count, 1);
}
