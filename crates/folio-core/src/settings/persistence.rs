//! Versioned storage of the settings partition.
//!
//! The payload is a JSON document `{ "version": N, "state": { ... } }` kept
//! in a single durable slot per reader surface. Loading never fails: a
//! missing, unreadable, malformed or foreign-version payload yields the
//! compiled-in defaults. Saving is fire-and-forget; failures are logged.
//! Inside a tokio runtime the write runs on the blocking pool through a
//! single drain loop that only ever writes the newest queued payload.

use super::models::{ReaderKind, ReaderSettings};
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// Schema version written by this build.
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// A durable key-value slot holding serialized blobs.
pub trait SettingsSlot: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, BackendError>;
    fn write(&self, key: &str, value: &str) -> Result<(), BackendError>;
}

#[derive(Serialize)]
struct PersistedSettingsRef<'a> {
    version: u32,
    state: &'a ReaderSettings,
}

#[derive(Deserialize)]
struct PersistedSettings {
    version: u32,
    state: serde_json::Value,
}

#[derive(Debug, Default)]
struct WriteQueue {
    queued: Option<String>,
    draining: bool,
}

pub struct SettingsPersistence {
    kind: ReaderKind,
    slot: Arc<dyn SettingsSlot>,
    queue: Arc<Mutex<WriteQueue>>,
}

impl SettingsPersistence {
    pub fn new(kind: ReaderKind, slot: impl SettingsSlot + 'static) -> Self {
        Self {
            kind,
            slot: Arc::new(slot),
            queue: Arc::new(Mutex::new(WriteQueue::default())),
        }
    }

    /// Whether a background write is queued or running.
    pub fn is_writing(&self) -> bool {
        lock_queue(&self.queue).draining
    }

    pub fn kind(&self) -> ReaderKind {
        self.kind
    }

    /// Read the persisted settings, falling back to defaults on any problem.
    pub fn load(&self) -> ReaderSettings {
        let key = self.kind.storage_key();
        let defaults = ReaderSettings::defaults_for(self.kind);
        let raw = match self.slot.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "No persisted reader settings; using defaults");
                return defaults;
            }
            Err(err) => {
                warn!(key, "Failed to read reader settings: {err}");
                return defaults;
            }
        };

        let persisted = match serde_json::from_str::<PersistedSettings>(&raw) {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(key, "Malformed reader settings payload: {err}");
                return defaults;
            }
        };
        if persisted.version != SETTINGS_SCHEMA_VERSION {
            warn!(
                key,
                found = persisted.version,
                expected = SETTINGS_SCHEMA_VERSION,
                "Reader settings schema version mismatch; using defaults"
            );
            return defaults;
        }

        match serde_json::from_value::<ReaderSettings>(persisted.state) {
            Ok(settings) => {
                info!(key, "Loaded reader settings");
                settings.sanitized()
            }
            Err(err) => {
                warn!(key, "Reader settings state has an incompatible shape: {err}");
                defaults
            }
        }
    }

    /// Persist the given settings. Errors are logged, never surfaced.
    pub fn save(&self, settings: &ReaderSettings) {
        let key = self.kind.storage_key();
        let payload = PersistedSettingsRef {
            version: SETTINGS_SCHEMA_VERSION,
            state: settings,
        };
        let encoded = match serde_json::to_string(&payload) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, "Failed to encode reader settings: {err}");
                return;
            }
        };
        match Handle::try_current() {
            Ok(handle) => self.enqueue(&handle, encoded),
            Err(_) => write_slot(&*self.slot, key, &encoded),
        }
    }

    fn enqueue(&self, handle: &Handle, encoded: String) {
        let key = self.kind.storage_key();
        {
            let mut queue = lock_queue(&self.queue);
            queue.queued = Some(encoded);
            if queue.draining {
                trace!(key, "Coalesced reader settings write");
                return;
            }
            queue.draining = true;
        }
        let slot = Arc::clone(&self.slot);
        let queue = Arc::clone(&self.queue);
        handle.spawn_blocking(move || {
            loop {
                let next = {
                    let mut queue = lock_queue(&queue);
                    match queue.queued.take() {
                        Some(next) => next,
                        None => {
                            queue.draining = false;
                            return;
                        }
                    }
                };
                write_slot(&*slot, key, &next);
            }
        });
    }
}

fn lock_queue(queue: &Mutex<WriteQueue>) -> MutexGuard<'_, WriteQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write_slot(slot: &dyn SettingsSlot, key: &str, encoded: &str) {
    if let Err(err) = slot.write(key, encoded) {
        warn!(key, "Failed to persist reader settings: {err}");
    } else {
        debug!(key, "Persisted reader settings");
    }
}

/// File-backed slots: one JSON file per key under a root directory.
///
/// File names are the SHA-256 of the key so arbitrary namespaces map to
/// safe paths.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    root: PathBuf,
}

impl FileSlotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.root.join(format!("{hash}.json"))
    }
}

impl SettingsSlot for FileSlotStore {
    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), BackendError> {
        fs::create_dir_all(&self.root)?;
        let path = self.slot_path(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process slots, for tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut slots) = store.slots.lock() {
            slots.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl SettingsSlot for MemorySlotStore {
    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| BackendError::Other("settings slot lock poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| BackendError::Other("settings slot lock poisoned".to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<T: SettingsSlot + ?Sized> SettingsSlot for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).write(key, value)
    }
}
