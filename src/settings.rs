use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

const DEBUG_DEBOUNCE_MS: u64 = 250;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// Quiet period after the last page turn before the position is written.
    pub debounce_ms: u64,
    /// How long deactivation waits for queued writes to drain.
    pub shutdown_timeout_ms: u64,
    pub database_path: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2_000,
            shutdown_timeout_ms: 3_000,
            database_path: PathBuf::from("shelf-reader.sqlite3"),
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `SHELF_DEBOUNCE_MS` and `SHELF_DB_PATH` win over the file;
    /// `SHELF_DEBUG=1` shortens the debounce unless it was set explicitly.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug_mode = lookup("SHELF_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.debounce_ms = DEBUG_DEBOUNCE_MS;
        }

        if let Some(ms) = lookup("SHELF_DEBOUNCE_MS").and_then(|raw| raw.parse().ok()) {
            self.debounce_ms = ms;
        }
        if let Some(path) = lookup("SHELF_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    sync: SyncSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing or unreadable JSON body falls
    /// back to defaults; environment overrides are applied on top.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };
        data.sync.apply_env_overrides();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn sync(&self) -> SyncSettings {
        self.read().sync.clone()
    }

    pub fn update_sync(&self, settings: SyncSettings) -> Result<()> {
        let mut guard = self.write();
        guard.sync = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
