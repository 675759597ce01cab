use std::sync::RwLock;

use anyhow::{Context, Result};
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::{keys, Database};

const MIN_MINUTES: u32 = 1;
const MAX_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStyle {
    Gentle,
    Urgent,
}

impl Default for AlarmStyle {
    fn default() -> Self {
        AlarmStyle::Urgent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    pub vibrate_enabled: bool,
    pub alarm_style: AlarmStyle,
    /// Minutes until a snoozed alert fires again.
    pub snooze_duration: u32,
    /// Minutes after the scheduled time before an unresolved dose is logged missed.
    pub missed_window: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notifications_enabled: true,
            vibrate_enabled: true,
            alarm_style: AlarmStyle::Urgent,
            snooze_duration: 5,
            missed_window: 60,
        }
    }
}

fn field_or<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, fallback: T) -> T {
    match map.get(key) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
            warn!("Ignoring malformed setting '{key}': {err}");
            fallback
        }),
        None => fallback,
    }
}

impl Settings {
    /// Decode a stored settings document field by field. Missing or malformed
    /// fields take their default; anything that is not a JSON object yields
    /// the full defaults.
    pub fn from_json_lenient(raw: &str) -> Self {
        let defaults = Self::default();
        let map = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("Stored settings are not a JSON object; using defaults");
                return defaults;
            }
        };

        Self {
            sound_enabled: field_or(&map, "soundEnabled", defaults.sound_enabled),
            notifications_enabled: field_or(
                &map,
                "notificationsEnabled",
                defaults.notifications_enabled,
            ),
            vibrate_enabled: field_or(&map, "vibrateEnabled", defaults.vibrate_enabled),
            alarm_style: field_or(&map, "alarmStyle", defaults.alarm_style),
            snooze_duration: field_or(&map, "snoozeDuration", defaults.snooze_duration),
            missed_window: field_or(&map, "missedWindow", defaults.missed_window),
        }
        .normalized()
    }

    /// Clamp the minute fields into a usable range.
    pub fn normalized(mut self) -> Self {
        self.snooze_duration = self.snooze_duration.clamp(MIN_MINUTES, MAX_MINUTES);
        self.missed_window = self.missed_window.clamp(MIN_MINUTES, MAX_MINUTES);
        self
    }
}

/// In-memory copy of the user settings, written through to the database on
/// every change.
pub struct SettingsStore {
    db: Database,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub async fn load(db: Database) -> Result<Self> {
        let data = db
            .get_value(keys::SETTINGS)
            .await
            .context("Failed to read settings")?
            .map(|raw| Settings::from_json_lenient(&raw))
            .unwrap_or_default();

        Ok(Self {
            db,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn update(&self, settings: Settings) -> Result<Settings> {
        let settings = settings.normalized();
        self.persist(&settings).await?;
        self.replace(settings.clone());
        Ok(settings)
    }

    /// Drop back to defaults without writing; used after a full reset has
    /// already removed the stored document.
    pub fn reset_in_memory(&self) {
        self.replace(Settings::default());
    }

    fn replace(&self, settings: Settings) {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
    }

    async fn persist(&self, settings: &Settings) -> Result<()> {
        let serialized = serde_json::to_string(settings)?;
        self.db
            .put_values(vec![(keys::SETTINGS, serialized)])
            .await
            .context("Failed to write settings")
    }
}
