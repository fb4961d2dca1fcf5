//! Durable key/value storage for the document and sync metadata.
//!
//! Every key is a JSON file in the data directory:
//! ```text
//! <DATA_DIR>/
//!   document-habits.json
//!   document-mood-log.json
//!   document-school-data.json
//!   document-updated-at.json
//!   document-sync-code.json
//!   document-sync-word.json
//!   device-id.json
//! ```
//!
//! Writes go to a temp file that is then renamed over the target.

mod persister;

pub use persister::spawn_persister;

use rand::distr::{Alphanumeric, SampleString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{empty_school_data, Document, Habit, MoodLog};
use crate::sync::{SyncCode, SyncCredentials};

pub mod keys {
    pub const HABITS: &str = "document-habits";
    pub const MOOD_LOG: &str = "document-mood-log";
    pub const SCHOOL_DATA: &str = "document-school-data";
    pub const UPDATED_AT: &str = "document-updated-at";
    pub const SYNC_CODE: &str = "document-sync-code";
    pub const SYNC_WORD: &str = "document-sync-word";
    pub const DEVICE_ID: &str = "device-id";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, #[source] io::Error),
    #[error("Failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
    #[error("Failed to serialize '{0}': {1}")]
    Serialize(String, #[source] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    /// Returns `Ok(None)` if the key has never been written.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path(key);

        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Parse(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;

        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialize(key.to_string(), e))?;

        let path = self.path(key);
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, bytes).map_err(|e| StoreError::Io(temp_path.clone(), e))?;
        fs::rename(&temp_path, &path).map_err(|e| StoreError::Io(path, e))?;

        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    /// Reads a key, treating unreadable or corrupt values as absent.
    fn get_or_warn<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring stored '{}': {}", key, e);
                None
            }
        }
    }

    /// Loads the document, falling back to defaults field by field when a
    /// key is missing or corrupt.
    pub fn load_document(&self, device_id: &str) -> Document {
        Document {
            habits: self
                .get_or_warn::<Vec<Habit>>(keys::HABITS)
                .unwrap_or_else(Habit::defaults),
            mental_state: self.get_or_warn::<MoodLog>(keys::MOOD_LOG).unwrap_or_default(),
            school_data: self
                .get_or_warn::<Value>(keys::SCHOOL_DATA)
                .filter(Value::is_object)
                .unwrap_or_else(empty_school_data),
            updated_at: self.get_or_warn::<i64>(keys::UPDATED_AT).unwrap_or(0),
            device_id: device_id.to_string(),
        }
    }

    pub fn save_document(&self, doc: &Document) -> Result<(), StoreError> {
        self.set(keys::HABITS, &doc.habits)?;
        self.set(keys::MOOD_LOG, &doc.mental_state)?;
        self.set(keys::SCHOOL_DATA, &doc.school_data)?;
        // Clock last: a crash mid-save leaves an older clock, never a newer
        // clock over older data.
        self.set(keys::UPDATED_AT, &doc.updated_at)
    }

    /// Returns the installation's device id, generating it on first use.
    pub fn device_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.get_or_warn::<String>(keys::DEVICE_ID) {
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let id = generate_device_id();
        self.set(keys::DEVICE_ID, &id)?;
        tracing::info!(device_id = %id, "Generated device id");
        Ok(id)
    }

    pub fn load_credentials(&self) -> Option<SyncCredentials> {
        let raw: String = self.get_or_warn(keys::SYNC_CODE)?;
        let code = match SyncCode::parse(&raw) {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!("Ignoring stored sync code: {}", e);
                return None;
            }
        };
        let word = self
            .get_or_warn::<String>(keys::SYNC_WORD)
            .filter(|w| !w.is_empty());
        Some(SyncCredentials::new(code, word))
    }

    pub fn save_credentials(&self, credentials: &SyncCredentials) -> Result<(), StoreError> {
        self.set(keys::SYNC_CODE, credentials.code.as_str())?;
        match &credentials.word {
            Some(word) => self.set(keys::SYNC_WORD, word),
            None => self.remove(keys::SYNC_WORD),
        }
    }

    pub fn clear_credentials(&self) -> Result<(), StoreError> {
        self.remove(keys::SYNC_CODE)?;
        self.remove(keys::SYNC_WORD)
    }
}

fn generate_device_id() -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 12);
    format!("dev-{}", suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MoodEntry;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().join("data"));
        (store, temp_dir)
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _temp) = test_store();
        let value: Option<String> = store.get(keys::SYNC_CODE).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_set_creates_directory() {
        let (store, _temp) = test_store();
        store.set(keys::UPDATED_AT, &42i64).unwrap();

        assert!(store.data_dir().exists());
        assert!(store.exists(keys::UPDATED_AT));
        assert_eq!(store.get::<i64>(keys::UPDATED_AT).unwrap(), Some(42));
    }

    #[test]
    fn test_fresh_store_loads_defaults() {
        let (store, _temp) = test_store();
        let doc = store.load_document("dev-a");
        assert_eq!(doc, Document::new("dev-a"));
    }

    #[test]
    fn test_document_survives_reload() {
        let (store, _temp) = test_store();
        let mut doc = Document::new("dev-a");
        doc.mental_state
            .insert("2025-05-05".into(), MoodEntry::new(5, 5));
        doc.school_data = json!({"subjects": [{"name": "Biology"}]});
        doc.updated_at = 1234;

        store.save_document(&doc).unwrap();
        assert_eq!(store.load_document("dev-a"), doc);
    }

    #[test]
    fn test_corrupt_field_falls_back() {
        let (store, _temp) = test_store();
        let mut doc = Document::new("dev-a");
        doc.updated_at = 99;
        store.save_document(&doc).unwrap();

        fs::write(store.path(keys::HABITS), b"{not json").unwrap();

        let loaded = store.load_document("dev-a");
        assert_eq!(loaded.habits, Habit::defaults());
        assert_eq!(loaded.updated_at, 99);
    }

    #[test]
    fn test_device_id_is_stable() {
        let (store, _temp) = test_store();
        let first = store.device_id().unwrap();
        let second = store.device_id().unwrap();

        assert!(first.starts_with("dev-"));
        assert_eq!(first.len(), 16);
        assert_eq!(first, second);
    }

    #[test]
    fn test_credentials_roundtrip_and_clear() {
        let (store, _temp) = test_store();
        assert!(store.load_credentials().is_none());

        let credentials =
            SyncCredentials::new(SyncCode::parse("Family-Code").unwrap(), Some("secret".into()));
        store.save_credentials(&credentials).unwrap();

        let loaded = store.load_credentials().unwrap();
        assert_eq!(loaded.code.as_str(), "family-code");
        assert_eq!(loaded.word.as_deref(), Some("secret"));

        store.clear_credentials().unwrap();
        assert!(store.load_credentials().is_none());
        assert!(!store.exists(keys::SYNC_WORD));
    }
}
