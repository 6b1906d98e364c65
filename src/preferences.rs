// src/preferences.rs
use crate::storage::{keys, Decoded, StorageAdapter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Singleton user preferences. Fields missing from the stored object take
/// their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub id: i64,
    pub dark_mode: bool,
    pub auto_increment: bool,
    pub notifications: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            id: 1,
            dark_mode: false,
            auto_increment: false,
            notifications: true,
            updated_at: DateTime::<Utc>::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreferencesPatch {
    pub dark_mode: Option<bool>,
    pub auto_increment: Option<bool>,
    pub notifications: Option<bool>,
}

impl PreferencesPatch {
    pub const fn is_empty(&self) -> bool {
        self.dark_mode.is_none() && self.auto_increment.is_none() && self.notifications.is_none()
    }
}

pub fn load(store: &mut StorageAdapter) -> UserPreferences {
    match store.read_json::<UserPreferences>(keys::PREFERENCES) {
        Decoded::Value(mut prefs) => {
            prefs.id = 1;
            prefs
        }
        Decoded::Missing => UserPreferences::default(),
        Decoded::Corrupted { key, .. } => {
            warn!(%key, "preferences are unreadable, using defaults");
            UserPreferences::default()
        }
    }
}

pub fn update(
    store: &mut StorageAdapter,
    patch: PreferencesPatch,
    now: DateTime<Utc>,
) -> UserPreferences {
    let mut prefs = load(store);
    if let Some(dark_mode) = patch.dark_mode {
        prefs.dark_mode = dark_mode;
    }
    if let Some(auto_increment) = patch.auto_increment {
        prefs.auto_increment = auto_increment;
    }
    if let Some(notifications) = patch.notifications {
        prefs.notifications = notifications;
    }
    prefs.updated_at = now;
    store.write_json(keys::PREFERENCES, &prefs);
    prefs
}
