//! Fingerprint → resource URL persistence.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::Url;
use tracing::debug;

use crate::error::StoreError;

/// Maps upload fingerprints to the resource URLs the server assigned.
pub trait ResumptionStore: Send + Sync {
    fn get(&self, fingerprint: &str) -> Result<Option<Url>, StoreError>;

    fn set(&self, fingerprint: &str, url: &Url) -> Result<(), StoreError>;

    /// Removing a missing fingerprint is not an error.
    fn remove(&self, fingerprint: &str) -> Result<(), StoreError>;
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Url>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }
}

impl ResumptionStore for MemoryStore {
    fn get(&self, fingerprint: &str) -> Result<Option<Url>, StoreError> {
        Ok(read(&self.entries).get(fingerprint).cloned())
    }

    fn set(&self, fingerprint: &str, url: &Url) -> Result<(), StoreError> {
        write(&self.entries).insert(fingerprint.to_string(), url.clone());
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> Result<(), StoreError> {
        write(&self.entries).remove(fingerprint);
        Ok(())
    }
}

/// Store persisted as a JSON object (`{"<fingerprint>": "<url>"}`).
///
/// Entries are cached in memory and the file is rewritten on every
/// mutation, so a crash never loses an acknowledged `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing entries. A missing file
    /// is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = load_entries(&path)?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored fingerprints, sorted.
    pub fn fingerprints(&self) -> Vec<String> {
        read(&self.entries).keys().cloned().collect()
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!("persisted {} resume entr(ies) to {:?}", entries.len(), self.path);
        Ok(())
    }
}

impl ResumptionStore for FileStore {
    fn get(&self, fingerprint: &str) -> Result<Option<Url>, StoreError> {
        let entries = read(&self.entries);
        let Some(raw) = entries.get(fingerprint) else {
            return Ok(None);
        };
        Url::parse(raw).map(Some).map_err(|_| StoreError::InvalidUrl {
            fingerprint: fingerprint.to_string(),
            url: raw.clone(),
        })
    }

    fn set(&self, fingerprint: &str, url: &Url) -> Result<(), StoreError> {
        let mut entries = write(&self.entries);
        let mut next = entries.clone();
        next.insert(fingerprint.to_string(), url.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> Result<(), StoreError> {
        let mut entries = write(&self.entries);
        if !entries.contains_key(fingerprint) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(fingerprint);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let entries: BTreeMap<String, String> = serde_json::from_str(&data)?;
    debug!("loaded {} resume entr(ies) from {:?}", entries.len(), path);
    Ok(entries)
}

/// Default location of the persistent store.
pub fn default_store_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("resumable-upload").join("resume.json"))
}

/// Per-user configuration root: `$XDG_CONFIG_HOME` (or `~/.config`) on
/// Unix, `~/Library/Application Support` on macOS, `%APPDATA%` on Windows.
pub fn config_dir() -> Option<PathBuf> {
    let env_dir = |name: &str| {
        std::env::var_os(name)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };

    if cfg!(target_os = "windows") {
        env_dir("APPDATA")
    } else if cfg!(target_os = "macos") {
        env_dir("HOME").map(|h| h.join("Library").join("Application Support"))
    } else {
        env_dir("XDG_CONFIG_HOME").or_else(|| env_dir("HOME").map(|h| h.join(".config")))
    }
}
