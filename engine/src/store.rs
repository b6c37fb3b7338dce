//! Settings store implementations.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use briefwatch_types::{SettingKey, SettingsMap};
use briefwatch_utils::{FileSyncPolicy, ensure_private_dir, read_state_file, write_state_file};
use serde_json::Value;
use tracing::warn;

use crate::services::{ServiceFut, SettingsStore, StoreError};

fn select(map: &SettingsMap, keys: &[SettingKey]) -> SettingsMap {
    keys.iter()
        .filter_map(|key| {
            map.get(key.as_str())
                .map(|value| (key.as_str().to_string(), value.clone()))
        })
        .collect()
}

/// In-process store. Used for ephemeral runs and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<SettingsMap>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the full contents.
    #[must_use]
    pub fn snapshot(&self) -> SettingsMap {
        self.values
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get<'a>(&'a self, keys: &'a [SettingKey]) -> ServiceFut<'a, SettingsMap, StoreError> {
        Box::pin(async move {
            let values = self
                .values
                .lock()
                .map_err(|_| StoreError::Unavailable("settings lock poisoned".to_string()))?;
            Ok(select(&values, keys))
        })
    }

    fn set(&self, values: SettingsMap) -> ServiceFut<'_, (), StoreError> {
        Box::pin(async move {
            let mut current = self
                .values
                .lock()
                .map_err(|_| StoreError::Unavailable("settings lock poisoned".to_string()))?;
            current.extend(values);
            Ok(())
        })
    }
}

/// JSON object on disk, rewritten atomically on every `set`.
///
/// The file is small and rarely written, so reads and writes happen inline
/// under a mutex that serializes read-modify-write cycles.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_private_dir(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<SettingsMap, StoreError> {
        let Some(bytes) = read_state_file(&self.path)? else {
            return Ok(SettingsMap::new());
        };
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Unavailable(format!(
                "expected a JSON object in {}, found {}",
                self.path.display(),
                type_name(&other)
            ))),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.lock
            .lock()
            .map_err(|_| StoreError::Unavailable("settings lock poisoned".to_string()))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl SettingsStore for FileSettingsStore {
    fn get<'a>(&'a self, keys: &'a [SettingKey]) -> ServiceFut<'a, SettingsMap, StoreError> {
        Box::pin(async move {
            let _guard = self.guard()?;
            Ok(select(&self.read_all()?, keys))
        })
    }

    fn set(&self, values: SettingsMap) -> ServiceFut<'_, (), StoreError> {
        Box::pin(async move {
            let _guard = self.guard()?;
            let mut current = match self.read_all() {
                Ok(map) => map,
                Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
                Err(e) => {
                    warn!(path = %self.path.display(), "Replacing unreadable settings file: {e}");
                    SettingsMap::new()
                }
            };
            current.extend(values);
            let bytes = serde_json::to_vec_pretty(&Value::Object(current))?;
            write_state_file(&self.path, &bytes, FileSyncPolicy::SyncAll)?;
            Ok(())
        })
    }
}
