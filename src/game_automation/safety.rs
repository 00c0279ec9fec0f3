//! Process liveness, the operator failsafe and the short-lived cache of
//! global settings that gates it.

use crate::config::{ConfigError, GlobalSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const SETTINGS_TTL: Duration = Duration::from_secs(5);

/// Process-wide liveness. Cleared on shutdown so every pipeline call stops.
#[derive(Debug, Clone)]
pub struct AppState {
    active: Arc<AtomicBool>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Operator panic condition.
pub trait FailsafeProbe: Send + Sync {
    fn is_triggered(&self) -> bool;
}

/// Triggered while a marker file exists, e.g. `touch /tmp/titan.stop`.
#[derive(Debug, Clone)]
pub struct PanicFile {
    path: PathBuf,
}

impl PanicFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FailsafeProbe for PanicFile {
    fn is_triggered(&self) -> bool {
        self.path.exists()
    }
}

pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Result<GlobalSettings, ConfigError>;
}

/// Fixed settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSettings(pub GlobalSettings);

impl SettingsSource for StaticSettings {
    fn load(&self) -> Result<GlobalSettings, ConfigError> {
        Ok(self.0)
    }
}

/// Settings read from a TOML file. A missing file means defaults.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for FileSettings {
    fn load(&self) -> Result<GlobalSettings, ConfigError> {
        if !self.path.exists() {
            return Ok(GlobalSettings::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Global settings re-read at most once per TTL.
pub struct SettingsCache {
    source: Arc<dyn SettingsSource>,
    ttl: Duration,
    cached: Mutex<Option<(Instant, GlobalSettings)>>,
}

impl SettingsCache {
    pub fn new(source: Arc<dyn SettingsSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> GlobalSettings {
        let mut cached = self.cached.lock().await;
        if let Some((loaded_at, settings)) = *cached
            && loaded_at.elapsed() < self.ttl
        {
            return settings;
        }
        let settings = match self.source.load() {
            Ok(settings) => settings,
            Err(e) => {
                // Keep the last good value rather than flapping to defaults.
                log::warn!("⚠️ Could not reload global settings: {}", e);
                (*cached).map(|(_, s)| s).unwrap_or_default()
            }
        };
        *cached = Some((Instant::now(), settings));
        settings
    }
}
