//! Persistent storage for the configuration bundle.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::WifiConfig;
use crate::error::PersistError;

/// Storage backend for the committed bundle.
pub trait ConfigPersist: Send + Sync {
    /// Load the stored bundle, `None` if nothing was stored yet.
    fn load(&self) -> Result<Option<WifiConfig>, PersistError>;

    /// Store the bundle, replacing any previous one.
    fn store(&self, config: &WifiConfig) -> Result<(), PersistError>;
}

/// JSON file store. Writes go to a sibling temp file and are renamed into place.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPersist for JsonFileStore {
    fn load(&self) -> Result<Option<WifiConfig>, PersistError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn store(&self, config: &WifiConfig) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(config)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Stored WiFi configuration");
        Ok(())
    }
}

/// In-memory store for development mode and tests.
#[derive(Default)]
pub struct MemoryStore {
    stored: Mutex<Option<WifiConfig>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `store` calls.
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stored(&self) -> Option<WifiConfig> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigPersist for MemoryStore {
    fn load(&self) -> Result<Option<WifiConfig>, PersistError> {
        Ok(self.stored())
    }

    fn store(&self, config: &WifiConfig) -> Result<(), PersistError> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpMode;

    #[test]
    fn test_json_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("wifi.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/wifi.json"));

        let config = WifiConfig {
            opmode: OpMode::Client,
            sta_ssid: "HomeNet".to_string(),
            sta_password: "hunter22".to_string(),
            ..Default::default()
        };
        store.store(&config).unwrap();

        assert_eq!(store.load().unwrap(), Some(config));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.json");
        fs::write(&path, b"{not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(PersistError::Json(_))));
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        store.store(&WifiConfig::default()).unwrap();
        store.store(&WifiConfig::default()).unwrap();
        assert_eq!(store.writes(), 2);
        assert_eq!(store.stored(), Some(WifiConfig::default()));
    }
}
