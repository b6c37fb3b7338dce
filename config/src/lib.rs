//! Configuration loading for briefwatch.
//!
//! `~/.briefwatch/config.toml` is deserialized into the raw structs below, where
//! every field is optional. [`BriefwatchConfig::resolve`] applies defaults and
//! validation once, producing the shared [`MonitorSettings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use briefwatch_types::{CheckInterval, FallbackTimings, MonitorSettings, SignalRules};

const CONFIG_DIR: &str = ".briefwatch";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => Some(path),
            Self::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BriefwatchConfig {
    pub monitor: Option<MonitorConfig>,
    pub fallback: Option<FallbackConfig>,
    pub signals: Option<SignalsConfig>,
    pub browser: Option<BrowserConfig>,
    pub state: Option<StateConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub target_url: Option<String>,
    /// Glob for tabs already showing the target page. Defaults to the target
    /// URL followed by `*`.
    pub tab_pattern: Option<String>,
    pub check_interval_seconds: Option<u64>,
    pub throttle_seconds: Option<u64>,
    pub auto_start: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    pub response_timeout_ms: Option<u64>,
    pub load_timeout_seconds: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub inject_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalsConfig {
    pub empty_state_selector: Option<String>,
    pub empty_state_markers: Option<Vec<String>>,
    pub primary_label: Option<String>,
    pub secondary_label: Option<String>,
}

/// Where the tab service finds a browser.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserConfig {
    /// DevTools endpoint of an already running browser
    /// (e.g. `http://127.0.0.1:9222`). Takes precedence over launching.
    pub debug_url: Option<String>,
    pub chromium_path: Option<PathBuf>,
    /// Launch headless. Default: false, so fallback tabs live next to the
    /// user's own session.
    #[serde(default)]
    pub headless: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    pub path: Option<PathBuf>,
}

impl BriefwatchConfig {
    /// Load the config from the default location.
    ///
    /// `Ok(None)` when the home directory is unknown or no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Apply defaults and validation.
    pub fn resolve(&self) -> Result<MonitorSettings, ConfigError> {
        let defaults = MonitorSettings::default();
        let monitor = self.monitor.as_ref();

        let target_url = match monitor.and_then(|m| m.target_url.as_deref()) {
            Some(raw) => Url::parse(raw).map_err(|e| ConfigError::Invalid {
                field: "monitor.target_url",
                reason: e.to_string(),
            })?,
            None => defaults.target_url,
        };

        let tab_pattern = match monitor.and_then(|m| m.tab_pattern.clone()) {
            Some(pattern) if pattern.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    field: "monitor.tab_pattern",
                    reason: "pattern is empty".to_string(),
                });
            }
            Some(pattern) => pattern,
            None => format!("{target_url}*"),
        };

        let default_interval = match monitor.and_then(|m| m.check_interval_seconds) {
            Some(secs) => {
                let (interval, adjusted) = CheckInterval::clamped(Duration::from_secs(secs));
                if adjusted {
                    tracing::warn!(
                        requested = secs,
                        applied = interval.get().as_secs(),
                        "check_interval_seconds out of range; clamped"
                    );
                }
                interval
            }
            None => defaults.default_interval,
        };

        let throttle_window = monitor
            .and_then(|m| m.throttle_seconds)
            .map_or(defaults.throttle_window, Duration::from_secs);

        let auto_start = monitor
            .and_then(|m| m.auto_start)
            .unwrap_or(defaults.auto_start);

        Ok(MonitorSettings {
            target_url,
            tab_pattern,
            default_interval,
            throttle_window,
            auto_start,
            timings: self.timings(),
            rules: self.rules()?,
        })
    }

    fn timings(&self) -> FallbackTimings {
        let d = FallbackTimings::default();
        let Some(f) = self.fallback.as_ref() else {
            return d;
        };
        FallbackTimings {
            response_timeout: f
                .response_timeout_ms
                .map_or(d.response_timeout, Duration::from_millis),
            load_timeout: f
                .load_timeout_seconds
                .map_or(d.load_timeout, Duration::from_secs),
            settle_delay: f
                .settle_delay_ms
                .map_or(d.settle_delay, Duration::from_millis),
            inject_delay: f
                .inject_delay_ms
                .map_or(d.inject_delay, Duration::from_millis),
        }
    }

    fn rules(&self) -> Result<SignalRules, ConfigError> {
        let d = SignalRules::default();
        let Some(s) = self.signals.as_ref() else {
            return Ok(d);
        };

        for (field, label) in [
            ("signals.primary_label", &s.primary_label),
            ("signals.secondary_label", &s.secondary_label),
        ] {
            if label.as_deref().is_some_and(|l| l.trim().is_empty()) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "label is empty".to_string(),
                });
            }
        }

        Ok(SignalRules {
            empty_state_selector: s
                .empty_state_selector
                .clone()
                .unwrap_or(d.empty_state_selector),
            empty_state_markers: s
                .empty_state_markers
                .clone()
                .unwrap_or(d.empty_state_markers),
            primary_label: s.primary_label.clone().unwrap_or(d.primary_label),
            secondary_label: s.secondary_label.clone().unwrap_or(d.secondary_label),
        })
    }

    #[must_use]
    pub fn browser(&self) -> BrowserConfig {
        self.browser.clone().unwrap_or_default()
    }

    /// Settings-store file: `[state] path`, else `~/.briefwatch/state.json`.
    #[must_use]
    pub fn state_path(&self) -> Option<PathBuf> {
        self.state
            .as_ref()
            .and_then(|s| s.path.clone())
            .or_else(default_state_path)
    }
}

#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[must_use]
pub fn default_state_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("state.json"))
}
