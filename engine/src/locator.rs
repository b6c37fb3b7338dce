//! Finding a live view of the target page.
//!
//! Existing tabs are tried first (pinned ones before the rest). If none answers,
//! a background tab is opened on the target URL, probed once, and closed again.
//! The fallback tab is closed exactly once on every exit path; if the poll is
//! cancelled mid-flight, [`FallbackTab`]'s drop hands the close to the runtime.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use briefwatch_types::{FallbackTimings, MonitorSettings, Observation};
use tracing::{debug, info, warn};
use url::Url;

use crate::extract::SignalExtractor;
use crate::services::{PageSnapshot, TabError, TabId, TabPattern, TabService};

/// Where a snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    ExistingTab(TabId),
    FallbackTab,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExistingTab(id) => write!(f, "existing tab {id}"),
            Self::FallbackTab => f.write_str("fallback tab"),
        }
    }
}

pub struct TabLocator {
    tabs: Arc<dyn TabService>,
    pattern: TabPattern,
    target: Url,
    timings: FallbackTimings,
}

impl TabLocator {
    pub fn new(tabs: Arc<dyn TabService>, settings: &MonitorSettings) -> Result<Self, TabError> {
        Ok(Self {
            tabs,
            pattern: TabPattern::new(&settings.tab_pattern)?,
            target: settings.target_url.clone(),
            timings: settings.timings,
        })
    }

    /// Observe the target page. Any failure yields [`Observation::NEUTRAL`].
    pub async fn locate_and_observe(&self, extractor: &SignalExtractor) -> Observation {
        match self.snapshot().await {
            Ok((source, snapshot)) => {
                debug!(%source, "Snapshot received");
                extractor.extract(&snapshot)
            }
            Err(e) => {
                warn!("Could not observe target page: {e}");
                Observation::NEUTRAL
            }
        }
    }

    /// Snapshot from the first responsive existing tab, else from a fallback tab.
    pub async fn snapshot(&self) -> Result<(SnapshotSource, PageSnapshot), TabError> {
        if let Some((id, snapshot)) = self.from_existing_tabs().await {
            return Ok((SnapshotSource::ExistingTab(id), snapshot));
        }
        let snapshot = self.from_fallback_tab().await?;
        Ok((SnapshotSource::FallbackTab, snapshot))
    }

    async fn from_existing_tabs(&self) -> Option<(TabId, PageSnapshot)> {
        let mut tabs = match self.tabs.query(&self.pattern).await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(pattern = self.pattern.as_str(), "Tab query failed: {e}");
                return None;
            }
        };
        // Stable: keeps the service's order within each group.
        tabs.sort_by_key(|tab| !tab.pinned);

        for tab in tabs {
            let request = self.tabs.request_snapshot(&tab.id);
            match bounded(self.timings.response_timeout, "tab response", request).await {
                Ok(snapshot) => return Some((tab.id, snapshot)),
                Err(e) => debug!(tab = %tab.id, "Existing tab did not answer: {e}"),
            }
        }
        None
    }

    async fn from_fallback_tab(&self) -> Result<PageSnapshot, TabError> {
        let id = self.tabs.create(&self.target, false).await?;
        info!(tab = %id, url = %self.target, "Opened fallback tab");

        let tab = FallbackTab::new(
            Arc::clone(&self.tabs),
            id.clone(),
            self.timings.response_timeout,
        );
        let result = self.probe_fallback(&id).await;
        tab.close().await;
        result
    }

    async fn probe_fallback(&self, id: &TabId) -> Result<PageSnapshot, TabError> {
        let t = &self.timings;
        bounded(t.load_timeout, "page load", self.tabs.wait_for_load(id)).await?;
        tokio::time::sleep(t.settle_delay).await;
        bounded(t.response_timeout, "probe injection", self.tabs.inject(id)).await?;
        tokio::time::sleep(t.inject_delay).await;
        bounded(t.response_timeout, "snapshot", self.tabs.request_snapshot(id)).await
    }
}

async fn bounded<T>(
    after: Duration,
    what: &'static str,
    fut: impl Future<Output = Result<T, TabError>>,
) -> Result<T, TabError> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| TabError::Timeout { what, after })?
}

/// Owns a fallback tab until it is closed.
struct FallbackTab {
    tabs: Arc<dyn TabService>,
    id: Option<TabId>,
    close_timeout: Duration,
}

impl FallbackTab {
    fn new(tabs: Arc<dyn TabService>, id: TabId, close_timeout: Duration) -> Self {
        Self {
            tabs,
            id: Some(id),
            close_timeout,
        }
    }

    async fn close(mut self) {
        if let Some(id) = self.id.take() {
            close_tab(self.tabs.as_ref(), &id, self.close_timeout).await;
        }
    }
}

impl Drop for FallbackTab {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let tabs = Arc::clone(&self.tabs);
        let close_timeout = self.close_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    close_tab(tabs.as_ref(), &id, close_timeout).await;
                });
            }
            Err(_) => warn!(tab = %id, "No runtime to close abandoned fallback tab"),
        }
    }
}

async fn close_tab(tabs: &dyn TabService, id: &TabId, close_timeout: Duration) {
    match bounded(close_timeout, "tab close", tabs.close(id)).await {
        Ok(()) => debug!(tab = %id, "Closed fallback tab"),
        Err(e) => warn!(tab = %id, "Failed to close fallback tab: {e}"),
    }
}
