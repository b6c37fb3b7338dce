//! Chromium-backed [`TabService`] over the Chrome DevTools Protocol.
//!
//! Either attaches to a browser the user already runs (started with
//! `--remote-debugging-port`) or launches a local Chromium with a throwaway
//! profile. A tab answers a snapshot request with its serialized DOM. Tabs
//! prepared with [`TabService::inject`] answer through the installed probe;
//! any other matching tab is read directly, which leaves the page untouched.
//! A tab with no document reports no responder.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use briefwatch_engine::{
    PageSnapshot, ServiceFut, TabError, TabId, TabInfo, TabPattern, TabService,
};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::{CreateTargetParams, TargetId};
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

mod discover;

pub use discover::find_chromium;

/// Installs `window.__briefwatchProbe`, returning the live DOM on demand.
const PROBE_SCRIPT: &str =
    "window.__briefwatchProbe = () => document.documentElement.outerHTML; true";

/// Serialized DOM via the probe when installed, else read directly.
/// `null` when the tab has no document.
const SNAPSHOT_SCRIPT: &str = "typeof window.__briefwatchProbe === 'function' \
     ? window.__briefwatchProbe() \
     : (document.documentElement ? document.documentElement.outerHTML : null)";

const READY_STATE_SCRIPT: &str = "document.readyState";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How to reach a browser.
#[derive(Debug, Clone, Default)]
pub struct ChromiumOptions {
    /// DevTools endpoint of a running browser. Preferred when set.
    pub debug_url: Option<String>,
    /// Executable to launch. Searched on PATH and platform paths when unset.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
}

pub struct ChromiumTabs {
    browser: Mutex<Browser>,
    /// Tabs opened by this service. User tabs are attached per call and never
    /// cached, so tabs closed elsewhere leave nothing behind.
    owned: Mutex<HashMap<TabId, Page>>,
    handler: JoinHandle<()>,
    _profile: Option<TempDir>,
}

impl ChromiumTabs {
    pub async fn start(options: &ChromiumOptions) -> Result<Self, TabError> {
        match &options.debug_url {
            Some(url) => Self::connect(url).await,
            None => Self::launch(options).await,
        }
    }

    pub async fn connect(debug_url: &str) -> Result<Self, TabError> {
        let (browser, mut handler) = Browser::connect(debug_url)
            .await
            .map_err(|e| TabError::Unavailable(format!("failed to attach to {debug_url}: {e}")))?;
        let handler = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });
        info!(%debug_url, "Attached to running browser");
        Ok(Self::from_parts(browser, handler, None))
    }

    pub async fn launch(options: &ChromiumOptions) -> Result<Self, TabError> {
        let executable = match &options.chromium_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                return Err(TabError::Unavailable(format!(
                    "chromium executable not found at {}",
                    path.display()
                )));
            }
            None => find_chromium()
                .ok_or_else(|| TabError::Unavailable("chromium executable not found".into()))?,
        };

        let profile = tempfile::Builder::new()
            .prefix("briefwatch-profile-")
            .tempdir()
            .map_err(|e| TabError::Unavailable(format!("failed to create browser profile: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .user_data_dir(profile.path())
            .args(["--no-first-run", "--no-default-browser-check"]);
        builder = if options.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| TabError::Unavailable(format!("failed to configure chromium: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| TabError::Unavailable(format!("failed to launch chromium: {e}")))?;
        let handler = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });
        info!(path = %executable.display(), headless = options.headless, "Launched chromium");
        Ok(Self::from_parts(browser, handler, Some(profile)))
    }

    fn from_parts(browser: Browser, handler: JoinHandle<()>, profile: Option<TempDir>) -> Self {
        Self {
            browser: Mutex::new(browser),
            owned: Mutex::new(HashMap::new()),
            handler,
            _profile: profile,
        }
    }

    async fn page(&self, tab: &TabId) -> Result<Page, TabError> {
        if let Some(page) = self.owned.lock().await.get(tab) {
            return Ok(page.clone());
        }
        self.browser
            .lock()
            .await
            .get_page(TargetId::new(tab.as_str()))
            .await
            .map_err(|_| TabError::NotFound(tab.clone()))
    }

}

impl Drop for ChromiumTabs {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn protocol(e: impl std::fmt::Display) -> TabError {
    TabError::Protocol(e.to_string())
}

/// Only top-level pages on a matching URL are candidates.
fn is_candidate(kind: &str, url: &str, pattern: &TabPattern) -> bool {
    kind == "page" && pattern.matches(url)
}

impl TabService for ChromiumTabs {
    fn query<'a>(&'a self, pattern: &'a TabPattern) -> ServiceFut<'a, Vec<TabInfo>, TabError> {
        Box::pin(async move {
            let targets = self
                .browser
                .lock()
                .await
                .fetch_targets()
                .await
                .map_err(protocol)?;
            // DevTools does not expose pinned state.
            Ok(targets
                .into_iter()
                .filter(|t| is_candidate(&t.r#type, &t.url, pattern))
                .map(|t| TabInfo {
                    id: TabId::new(t.target_id.inner().clone()),
                    url: t.url,
                    pinned: false,
                })
                .collect())
        })
    }

    fn request_snapshot<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, PageSnapshot, TabError> {
        Box::pin(async move {
            let page = self.page(tab).await?;
            let result = page.evaluate(SNAPSHOT_SCRIPT).await.map_err(protocol)?;
            let Ok(Some(html)) = result.into_value::<Option<String>>() else {
                return Err(TabError::NoResponder(tab.clone()));
            };
            let url = page.url().await.ok().flatten().unwrap_or_default();
            debug!(%tab, bytes = html.len(), "Snapshot served by probe");
            Ok(PageSnapshot { url, html })
        })
    }

    fn create<'a>(&'a self, url: &'a Url, active: bool) -> ServiceFut<'a, TabId, TabError> {
        Box::pin(async move {
            let mut params = CreateTargetParams::new(url.as_str());
            params.background = Some(!active);
            let page = self
                .browser
                .lock()
                .await
                .new_page(params)
                .await
                .map_err(protocol)?;
            if active {
                page.bring_to_front().await.map_err(protocol)?;
            }
            let id = TabId::new(page.target_id().inner().clone());
            self.owned.lock().await.insert(id.clone(), page);
            Ok(id)
        })
    }

    fn wait_for_load<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError> {
        Box::pin(async move {
            let page = self.page(tab).await?;
            loop {
                let state = page.evaluate(READY_STATE_SCRIPT).await.map_err(protocol)?;
                if state.into_value::<String>().is_ok_and(|s| s == "complete") {
                    return Ok(());
                }
                sleep(READY_POLL_INTERVAL).await;
            }
        })
    }

    fn inject<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError> {
        Box::pin(async move {
            let page = self.page(tab).await?;
            page.evaluate(PROBE_SCRIPT).await.map_err(protocol)?;
            Ok(())
        })
    }

    fn close<'a>(&'a self, tab: &'a TabId) -> ServiceFut<'a, (), TabError> {
        Box::pin(async move {
            let owned = self.owned.lock().await.remove(tab);
            let page = match owned {
                Some(page) => page,
                None => self.page(tab).await?,
            };
            page.close().await.map_err(protocol)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_matching_pages_are_candidates() {
        let pattern = TabPattern::new("https://www.fiverr.com/briefs/overview/matches*").unwrap();
        assert!(is_candidate(
            "page",
            "https://www.fiverr.com/briefs/overview/matches?tab=new",
            &pattern
        ));
        assert!(!is_candidate(
            "service_worker",
            "https://www.fiverr.com/briefs/overview/matches",
            &pattern
        ));
        assert!(!is_candidate("page", "https://www.fiverr.com/", &pattern));
    }

    #[test]
    fn probe_and_snapshot_scripts_agree_on_name() {
        assert!(PROBE_SCRIPT.contains("window.__briefwatchProbe ="));
        assert!(SNAPSHOT_SCRIPT.contains("window.__briefwatchProbe()"));
    }

    #[test]
    fn snapshot_reads_dom_without_probe() {
        let (_, without_probe) = SNAPSHOT_SCRIPT
            .split_once(" : ")
            .expect("probe branch and direct branch");
        assert!(without_probe.contains("document.documentElement.outerHTML"));
        assert!(!without_probe.contains("__briefwatchProbe"));
    }
}
