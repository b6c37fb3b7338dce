//! Monitoring actor and its command bus.
//!
//! A single task owns all monitoring state. Bus commands, timer ticks, and
//! poll completions are serialized through one `select!` loop, so every
//! command observes a consistent Idle/Active state. Poll cycles run as their
//! own tasks; at most one is in flight and ticks or manual checks arriving
//! meanwhile are dropped.

use std::sync::Arc;
use std::time::Duration;

use briefwatch_types::{
    CheckInterval, CommandResponse, MonitorCommand, MonitorEvent, MonitorSettings, MonitorStatus,
    SettingKey, SettingsMap, StatsSnapshot,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use crate::cycle::{CycleReport, PollCycle, Services};
use crate::services::{Clock, SettingsStore, TabError, TabService};
use crate::state::{PersistedState, persist, persist_one, read_enabled};

const COMMAND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 64;
const OPEN_TARGET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BusError {
    #[error("monitor is no longer running")]
    Closed,
}

enum Envelope {
    Command {
        command: MonitorCommand,
        reply: oneshot::Sender<CommandResponse>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Client side of the command bus. Cheap to clone.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<Envelope>,
    events: broadcast::Sender<MonitorEvent>,
}

impl MonitorHandle {
    /// Send a command and wait for the actor's reply.
    pub async fn send(&self, command: MonitorCommand) -> Result<CommandResponse, BusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Command { command, reply })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await.map_err(|_| BusError::Closed)
    }

    /// Receive `statsUpdate` and monitoring-changed events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Stop the actor after any in-flight poll finishes. The persisted
    /// enabled flag is left as is so the next launch resumes.
    pub async fn shutdown(&self) -> Result<(), BusError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Shutdown { done })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await.map_err(|_| BusError::Closed)
    }
}

/// Configured but not yet running monitor.
pub struct Monitor {
    cycle: Arc<PollCycle>,
    store: Arc<dyn SettingsStore>,
    tabs: Arc<dyn TabService>,
    clock: Arc<dyn Clock>,
    target: Url,
    default_interval: CheckInterval,
    auto_start: bool,
    events: broadcast::Sender<MonitorEvent>,
}

impl Monitor {
    pub fn new(settings: &MonitorSettings, services: Services) -> Result<Self, TabError> {
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let cycle = PollCycle::new(settings, &services, events.clone())?;
        Ok(Self {
            cycle: Arc::new(cycle),
            store: services.store,
            tabs: services.tabs,
            clock: services.clock,
            target: settings.target_url.clone(),
            default_interval: settings.default_interval,
            auto_start: settings.auto_start,
            events,
        })
    }

    /// Start the actor. Monitoring resumes immediately when the persisted
    /// flag (or, on first run, `auto_start`) says so.
    #[must_use]
    pub fn spawn(self) -> (MonitorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let handle = MonitorHandle {
            tx,
            events: self.events.clone(),
        };
        let actor = Actor {
            cycle: self.cycle,
            store: self.store,
            tabs: self.tabs,
            clock: self.clock,
            target: self.target,
            default_interval: self.default_interval,
            auto_start: self.auto_start,
            events: self.events,
            interval: self.default_interval,
            timer: None,
            in_flight: None,
            stats: StatsSnapshot::default(),
        };
        (handle, tokio::spawn(actor.run(rx)))
    }
}

struct Actor {
    cycle: Arc<PollCycle>,
    store: Arc<dyn SettingsStore>,
    tabs: Arc<dyn TabService>,
    clock: Arc<dyn Clock>,
    target: Url,
    default_interval: CheckInterval,
    auto_start: bool,
    events: broadcast::Sender<MonitorEvent>,

    interval: CheckInterval,
    /// `Some` exactly while Active.
    timer: Option<Interval>,
    in_flight: Option<JoinHandle<CycleReport>>,
    stats: StatsSnapshot,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        self.bootstrap().await;

        loop {
            tokio::select! {
                envelope = rx.recv() => match envelope {
                    Some(Envelope::Command { command, reply }) => {
                        let response = self.handle(command).await;
                        let _ = reply.send(response);
                    }
                    Some(Envelope::Shutdown { done }) => {
                        self.wind_down().await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        self.wind_down().await;
                        return;
                    }
                },
                () = next_tick(&mut self.timer) => self.on_tick().await,
                result = cycle_finished(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.on_cycle_finished(result);
                }
            }
        }
    }

    async fn bootstrap(&mut self) {
        let state = PersistedState::load(self.store.as_ref()).await;
        self.interval = state.interval_or(self.default_interval);
        self.stats = state.stats(&self.clock.today());

        let enabled = match state.enabled {
            Some(enabled) => enabled,
            None => {
                info!(
                    auto_start = self.auto_start,
                    interval_ms = self.interval.as_millis(),
                    "First run; writing default settings"
                );
                let mut values = SettingsMap::new();
                SettingKey::IsEnabled.put(&mut values, self.auto_start);
                SettingKey::CheckInterval.put(&mut values, self.interval.as_millis());
                persist(self.store.as_ref(), values).await;
                self.auto_start
            }
        };

        if enabled {
            self.start().await;
        }
    }

    async fn handle(&mut self, command: MonitorCommand) -> CommandResponse {
        debug!(?command, "Bus command");
        match command {
            MonitorCommand::StartMonitoring => {
                self.start().await;
                CommandResponse::ok()
            }
            MonitorCommand::StopMonitoring => {
                self.stop().await;
                CommandResponse::ok()
            }
            MonitorCommand::GetMonitoringStatus => CommandResponse::with_status(self.status()),
            MonitorCommand::CheckBriefs => {
                self.launch_cycle("manual check");
                CommandResponse::ok()
            }
            MonitorCommand::SetInterval { interval_ms } => {
                self.set_interval(interval_ms).await;
                CommandResponse::with_status(self.status())
            }
            MonitorCommand::OpenTarget => self.open_target().await,
        }
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            is_monitoring: self.timer.is_some(),
            interval_ms: self.interval.as_millis(),
            check_in_flight: self.in_flight.is_some(),
            stats: self.stats,
        }
    }

    /// No-op when Active. Otherwise persist enabled, poll now, arm the timer
    /// with the stored interval.
    async fn start(&mut self) {
        if self.timer.is_some() {
            debug!("Monitoring already active");
            return;
        }
        persist_one(self.store.as_ref(), SettingKey::IsEnabled, true).await;
        self.interval = PersistedState::load(self.store.as_ref())
            .await
            .interval_or(self.interval);
        self.arm();
        info!(interval_ms = self.interval.as_millis(), "Monitoring started");
        let _ = self.events.send(MonitorEvent::MonitoringChanged { running: true });
    }

    /// Idempotent. An in-flight poll is left to finish.
    async fn stop(&mut self) {
        let was_active = self.timer.take().is_some();
        persist_one(self.store.as_ref(), SettingKey::IsEnabled, false).await;
        if was_active {
            info!("Monitoring stopped");
            let _ = self.events.send(MonitorEvent::MonitoringChanged { running: false });
        }
    }

    /// Poll immediately and schedule the next tick one period out.
    fn arm(&mut self) {
        self.launch_cycle("start");
        let period = self.interval.get();
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    async fn set_interval(&mut self, interval_ms: u64) {
        let (interval, adjusted) = CheckInterval::from_millis(interval_ms);
        if adjusted {
            warn!(
                requested_ms = interval_ms,
                applied_ms = interval.as_millis(),
                "Interval out of range; clamped"
            );
        }
        persist_one(
            self.store.as_ref(),
            SettingKey::CheckInterval,
            interval.as_millis(),
        )
        .await;

        // Restart in place: the enabled flag and observers never see Idle.
        self.interval = interval;
        if self.timer.take().is_some() {
            self.arm();
            info!(interval_ms = interval.as_millis(), "Monitoring restarted");
        }
    }

    async fn on_tick(&mut self) {
        if !read_enabled(self.store.as_ref()).await {
            info!("Monitoring disabled externally");
            self.stop().await;
            return;
        }
        self.launch_cycle("tick");
    }

    fn launch_cycle(&mut self, reason: &'static str) {
        if self.in_flight.is_some() {
            debug!(reason, "Poll already in flight; dropping request");
            return;
        }
        let cycle = Arc::clone(&self.cycle);
        self.in_flight = Some(tokio::spawn(async move { cycle.run().await }));
        debug!(reason, "Poll launched");
    }

    fn on_cycle_finished(&mut self, result: Result<CycleReport, JoinError>) {
        match result {
            Ok(report) => self.stats = report.stats,
            Err(e) => warn!("Poll task failed: {e}"),
        }
    }

    async fn open_target(&self) -> CommandResponse {
        let create = self.tabs.create(&self.target, true);
        match tokio::time::timeout(OPEN_TARGET_TIMEOUT, create).await {
            Ok(Ok(tab)) => {
                info!(%tab, url = %self.target, "Opened target page");
                CommandResponse::ok()
            }
            Ok(Err(e)) => CommandResponse::failed(e.to_string()),
            Err(_) => CommandResponse::failed(format!(
                "timed out after {OPEN_TARGET_TIMEOUT:?} opening the target page"
            )),
        }
    }

    async fn wind_down(&mut self) {
        self.timer = None;
        if let Some(cycle) = self.in_flight.take() {
            let result = cycle.await;
            self.on_cycle_finished(result);
        }
        info!("Monitor shut down");
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn cycle_finished(
    slot: &mut Option<JoinHandle<CycleReport>>,
) -> Result<CycleReport, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
