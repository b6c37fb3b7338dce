//! Monitoring engine for briefwatch.
//!
//! Decides when to poll ([`scheduler`]), where to look ([`locator`]), what the
//! page says ([`extract`]), and whether to tell the user ([`gate`]). Storage,
//! tabs, and notifications are reached through the traits in [`services`].

pub mod cycle;
pub mod extract;
pub mod gate;
pub mod locator;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;

pub use cycle::{CycleReport, PollCycle, Services};
pub use extract::SignalExtractor;
pub use gate::{NotificationGate, ThrottleState};
pub use locator::{SnapshotSource, TabLocator};
pub use scheduler::{BusError, Monitor, MonitorHandle};
pub use services::{
    Clock, NotificationService, NotifyError, PageSnapshot, ServiceFut, SettingsStore, StoreError,
    SystemClock, TabError, TabId, TabInfo, TabPattern, TabService,
};
pub use state::PersistedState;
pub use store::{FileSettingsStore, MemorySettingsStore};
