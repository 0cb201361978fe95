use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::device::DEFAULT_DEVICE_URL;
use crate::models::ShotSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub theme: Theme,
    pub gaggiuino_url: String,
    /// Charts shown side by side.
    pub max_charts: u32,
    /// Newest shots charted on startup; never more than `max_charts`.
    pub autoload_recent_shots: u32,
    pub favorite_shots: Vec<ShotSummary>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            gaggiuino_url: DEFAULT_DEVICE_URL.into(),
            max_charts: 3,
            autoload_recent_shots: 2,
            favorite_shots: Vec::new(),
        }
    }
}

impl UserSettings {
    fn normalized(mut self) -> Self {
        self.gaggiuino_url = crate::device::normalize_base_url(&self.gaggiuino_url);
        self.max_charts = self.max_charts.max(1);
        self.autoload_recent_shots = self.autoload_recent_shots.min(self.max_charts);
        self.favorite_shots.sort_by(|a, b| b.id.cmp(&a.id));
        self.favorite_shots.dedup();
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<UserSettings>(&contents)
                .unwrap_or_default()
                .normalized()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn gaggiuino_url(&self) -> String {
        self.read().gaggiuino_url.clone()
    }

    /// Replaces and persists the settings, returning what was stored.
    pub fn update(&self, settings: UserSettings) -> Result<UserSettings> {
        let settings = settings.normalized();
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings.clone();
        Ok(settings)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
