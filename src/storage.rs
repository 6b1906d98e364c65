// src/storage.rs
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, warn};

const DB_FILE_NAME: &str = "ironpup.sqlite";
const APP_DATA_DIR: &str = "ironpup";

/// Logical keys, stored with the adapter's namespace prefix in front.
pub mod keys {
    pub const WORKOUTS: &str = "workouts";
    pub const PREFERENCES: &str = "preferences";
    pub const CURRENT_ID: &str = "current_id";
    pub const EXERCISE_HISTORY: &str = "exercise_history";
    pub const CUSTOM_TEMPLATES: &str = "custom_templates";
    pub const AUTO_SCHEDULE: &str = "auto_schedule_workouts";
    pub const HIDDEN_PRESETS: &str = "hidden_presets";
    pub const PRESET_PROMPTS: &str = "preset_prompts";
    pub const STREAK_DAYS: &str = "streak_days";
    pub const SCHEMA_VERSION: &str = "schema_version";
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend is unavailable: {0}")]
    Unavailable(String),
    #[error("Storage quota exceeded while writing '{0}'")]
    QuotaExceeded(String),
    #[error("SQLite storage failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing storage file")]
    Io(#[from] std::io::Error),
}

/// A synchronous key-value backend. Implementations report failures; the
/// [`StorageAdapter`] decides what to do about them.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Durable backend: a single `kv` table in a SQLite file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

// SQLITE_FULL is the closest thing SQLite has to a storage quota.
fn classify_write_error(key: &str, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        if failure.code == ErrorCode::DiskFull {
            return StoreError::QuotaExceeded(key.to_string());
        }
    }
    StoreError::Sqlite(err)
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StoreError::from)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| classify_write_error(key, e))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>()
            .map_err(StoreError::from)
    }
}

/// Stands in for a backend that could not be opened. Every call fails, so
/// the adapter switches to memory on first use.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        self.fail()
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        self.fail()
    }

    fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
        self.fail()
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.fail()
    }
}

/// Gets the path to the SQLite store within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_db_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir().ok_or(StoreError::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// User-facing storage events. Delivered best-effort through a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    StorageUnavailable { reason: String },
    QuotaWarning { used_bytes: usize, limit_bytes: usize },
    DataEvicted { removed: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageUnavailable { reason } => write!(
                f,
                "Storage is unavailable ({reason}). Changes are kept in memory only until the app closes."
            ),
            Self::QuotaWarning {
                used_bytes,
                limit_bytes,
            } => write!(
                f,
                "Storage is almost full ({used_bytes} of {limit_bytes} bytes used). Consider exporting a backup."
            ),
            Self::DataEvicted { removed } => write!(
                f,
                "Storage was full: {removed} of the oldest workouts were removed."
            ),
        }
    }
}

pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Sends notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        warn!(%notice, "storage notice");
    }
}

/// Collects notices so the front end can show them after an operation.
/// Clones share the same board.
#[derive(Debug, Default, Clone)]
pub struct NoticeBoard {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.notices.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.borrow().is_empty()
    }
}

impl Notifier for NoticeBoard {
    fn notify(&self, notice: Notice) {
        debug!(%notice, "storage notice queued");
        self.notices.borrow_mut().push(notice);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaPolicy {
    pub limit_bytes: usize,
    pub warn_ratio: f64,
}

impl QuotaPolicy {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn warn_threshold(&self) -> usize {
        (self.limit_bytes as f64 * self.warn_ratio) as usize
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            limit_bytes: 5 * 1024 * 1024,
            warn_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub used_bytes: usize,
    pub limit_bytes: usize,
}

/// Outcome of reading and parsing a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    Missing,
    Corrupted { key: String, error: String },
}

impl<T> Decoded<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Corrupted { .. } => None,
        }
    }

    pub const fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    pub fn or_default(self) -> T
    where
        T: Default,
    {
        self.value().unwrap_or_default()
    }
}

/// Wraps a [`KeyValueStore`] so that callers never see a storage failure.
///
/// The first backend error flips the adapter into memory-only mode for the
/// rest of its lifetime. Values already in the backend stay there but are no
/// longer read. While the backend is healthy, writes are checked against the
/// [`QuotaPolicy`] and the oldest workouts are evicted when it is exceeded.
pub struct StorageAdapter {
    backend: Box<dyn KeyValueStore>,
    fallback: BTreeMap<String, String>,
    failed: bool,
    warned: bool,
    namespace: String,
    policy: QuotaPolicy,
    notifier: Box<dyn Notifier>,
}

impl StorageAdapter {
    pub fn new(
        backend: Box<dyn KeyValueStore>,
        namespace: impl Into<String>,
        policy: QuotaPolicy,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            fallback: BTreeMap::new(),
            failed: false,
            warned: false,
            namespace: namespace.into(),
            policy,
            notifier,
        }
    }

    /// An adapter over a fresh [`MemoryStore`], logging notices only.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(
            Box::new(MemoryStore::new()),
            namespace,
            QuotaPolicy::default(),
            Box::new(LogNotifier),
        )
    }

    pub const fn is_degraded(&self) -> bool {
        self.failed
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub const fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn fail_over(&mut self, op: &str, key: &str, err: &StoreError) {
        error!(op, key, error = %err, "storage operation failed, using in-memory fallback");
        if !self.failed {
            self.failed = true;
            self.notifier.notify(Notice::StorageUnavailable {
                reason: err.to_string(),
            });
        }
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        let full = self.full_key(key);
        if self.failed {
            return self.fallback.get(&full).cloned();
        }
        match self.backend.get(&full) {
            Ok(value) => value,
            Err(e) => {
                self.fail_over("get", &full, &e);
                self.fallback.get(&full).cloned()
            }
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let full = self.full_key(key);
        if self.failed {
            self.fallback.insert(full, value.to_string());
            return;
        }
        match self.backend.set(&full, value) {
            Ok(()) => self.check_quota(),
            Err(StoreError::QuotaExceeded(_)) => self.recover_from_quota(key, value),
            Err(e) => {
                self.fail_over("set", &full, &e);
                self.fallback.insert(full, value.to_string());
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        let full = self.full_key(key);
        if self.failed {
            self.fallback.remove(&full);
            return;
        }
        if let Err(e) = self.backend.remove(&full) {
            self.fail_over("remove", &full, &e);
            self.fallback.remove(&full);
        }
    }

    /// Logical keys (namespace stripped) currently visible to the adapter.
    pub fn keys(&mut self) -> Vec<String> {
        let raw = if self.failed {
            self.fallback.keys().cloned().collect()
        } else {
            match self.backend.keys() {
                Ok(keys) => keys,
                Err(e) => {
                    let namespace = self.namespace.clone();
                    self.fail_over("keys", &namespace, &e);
                    self.fallback.keys().cloned().collect()
                }
            }
        };
        raw.into_iter()
            .filter_map(|k| k.strip_prefix(self.namespace.as_str()).map(str::to_string))
            .collect()
    }

    /// Removes every key under the namespace. Keys of other namespaces are
    /// left alone.
    pub fn clear_namespace(&mut self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }

    /// Approximate usage: the sum of key and value lengths of every
    /// namespaced entry.
    pub fn usage(&mut self) -> StorageUsage {
        let mut used_bytes = 0;
        for key in self.keys() {
            let full_len = self.namespace.len() + key.len();
            used_bytes += full_len + self.get(&key).map_or(0, |v| v.len());
        }
        StorageUsage {
            used_bytes,
            limit_bytes: self.policy.limit_bytes,
        }
    }

    pub fn read_json<T: DeserializeOwned>(&mut self, key: &str) -> Decoded<T> {
        let Some(raw) = self.get(key) else {
            return Decoded::Missing;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Decoded::Value(value),
            Err(e) => {
                error!(key, error = %e, "stored value is not valid JSON, ignoring it");
                Decoded::Corrupted {
                    key: key.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    pub fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(e) => error!(key, error = %e, "failed to serialize value, not stored"),
        }
    }

    fn check_quota(&mut self) {
        let usage = self.usage();
        if usage.used_bytes >= self.policy.warn_threshold() && !self.warned {
            self.warned = true;
            self.notifier.notify(Notice::QuotaWarning {
                used_bytes: usage.used_bytes,
                limit_bytes: usage.limit_bytes,
            });
        }
        if usage.used_bytes > self.policy.limit_bytes {
            warn!(
                used = usage.used_bytes,
                limit = usage.limit_bytes,
                "storage over quota, evicting oldest workouts"
            );
            self.evict_stored_workouts(usage.used_bytes);
        }
    }

    fn evict_stored_workouts(&mut self, used_bytes: usize) -> usize {
        let Some(stored) = self.get(keys::WORKOUTS) else {
            return 0;
        };
        let key_len = self.namespace.len() + keys::WORKOUTS.len();
        let others = used_bytes.saturating_sub(key_len + stored.len());
        let Some((trimmed, removed)) = self.trim_oldest(&stored, others) else {
            return 0;
        };
        if removed == 0 {
            return 0;
        }
        let full = self.full_key(keys::WORKOUTS);
        if let Err(e) = self.backend.set(&full, &trimmed) {
            self.fail_over("set", &full, &e);
            self.fallback.insert(full, trimmed);
        }
        self.notifier.notify(Notice::DataEvicted { removed });
        removed
    }

    fn recover_from_quota(&mut self, key: &str, value: &str) {
        warn!(key, "storage quota exceeded, evicting oldest workouts");
        let full = self.full_key(key);
        let (value, removed) = if key == keys::WORKOUTS {
            // The incoming collection is what does not fit, trim that one.
            let used = self.usage().used_bytes;
            let others = match self.get(keys::WORKOUTS) {
                Some(stored) => {
                    used.saturating_sub(self.namespace.len() + keys::WORKOUTS.len() + stored.len())
                }
                None => used,
            };
            match self.trim_oldest(value, others) {
                Some((trimmed, removed)) => (trimmed, removed),
                None => (value.to_string(), 0),
            }
        } else {
            let used = self.usage().used_bytes + full.len() + value.len();
            let removed = self.evict_stored_workouts(used);
            (value.to_string(), removed)
        };

        if key == keys::WORKOUTS && removed > 0 {
            self.notifier.notify(Notice::DataEvicted { removed });
        }

        if let Err(e) = self.backend.set(&full, &value) {
            self.fail_over("set", &full, &e);
            self.fallback.insert(full, value);
        }
    }

    /// Drops workouts from a serialized collection, oldest `date` first,
    /// until the collection plus `others` bytes fits under the warning
    /// threshold. Returns `None` if the collection is not a JSON array.
    fn trim_oldest(&self, raw: &str, others: usize) -> Option<(String, usize)> {
        let mut workouts: Vec<Value> = match serde_json::from_str(raw) {
            Ok(list) => list,
            Err(e) => {
                error!(error = %e, "cannot evict from corrupted workouts collection");
                return None;
            }
        };
        let threshold = self.policy.warn_threshold();
        let key_len = self.namespace.len() + keys::WORKOUTS.len();
        let mut serialized = raw.to_string();
        let mut removed = 0;

        while others + key_len + serialized.len() >= threshold && !workouts.is_empty() {
            let oldest = workouts
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| date_of(a).cmp(date_of(b)))
                .map(|(idx, _)| idx)?;
            let evicted = workouts.remove(oldest);
            debug!(date = date_of(&evicted), "evicted workout");
            removed += 1;
            serialized = serde_json::to_string(&workouts).ok()?;
        }
        Some((serialized, removed))
    }
}

fn date_of(workout: &Value) -> &str {
    workout.get("date").and_then(Value::as_str).unwrap_or("")
}

impl fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("namespace", &self.namespace)
            .field("failed", &self.failed)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
