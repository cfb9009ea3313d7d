//! Parameter persistence: save and load the fitted record across restarts.
//!
//! Provides the `ParameterStore` trait and a `JsonFileStore` implementation
//! that keeps exactly one `FittedParameters` record in a JSON document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AnomalyError, AnomalyResult};
use crate::params::FittedParameters;

/// Durable storage for one parameter record.
pub trait ParameterStore: Send + Sync {
    /// Load the stored record.
    ///
    /// Returns an uninitialized record if nothing has been stored yet. A
    /// record that exists but cannot be parsed is an error, never "absent".
    fn load(&self) -> AnomalyResult<FittedParameters>;

    /// Replace the stored record.
    fn save(&self, params: &FittedParameters) -> AnomalyResult<()>;
}

/// JSON-file based parameter persistence.
///
/// Writes are atomic (write to `<file>.tmp`, then rename) so a reader never
/// sees a half-written document. Parent directories are expected to exist.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store bound to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ParameterStore for JsonFileStore {
    fn load(&self) -> AnomalyResult<FittedParameters> {
        // Open directly: a file removed between a check and the open would
        // otherwise surface as a hard error.
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no parameter file, starting unfitted");
                return Ok(FittedParameters::uninitialized());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|e| {
            AnomalyError::PersistenceError(format!(
                "deserialization of {} failed: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, params: &FittedParameters) -> AnomalyResult<()> {
        let json = serde_json::to_string_pretty(params).map_err(|e| {
            AnomalyError::PersistenceError(format!("serialization failed: {}", e))
        })?;

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, json)?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        debug!(path = %self.path.display(), "parameters saved");
        Ok(())
    }
}

/// In-memory parameter store (for tests and embedding).
pub struct InMemoryStore {
    data: parking_lot::Mutex<Option<FittedParameters>>,
}

impl InMemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: parking_lot::Mutex::new(None),
        }
    }

    /// Create a store pre-populated with a record.
    pub fn with_params(params: FittedParameters) -> Self {
        Self {
            data: parking_lot::Mutex::new(Some(params)),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore for InMemoryStore {
    fn load(&self) -> AnomalyResult<FittedParameters> {
        Ok(self
            .data
            .lock()
            .clone()
            .unwrap_or_else(FittedParameters::uninitialized))
    }

    fn save(&self, params: &FittedParameters) -> AnomalyResult<()> {
        *self.data.lock() = Some(params.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fitted(mean: f64) -> FittedParameters {
        FittedParameters::fitted(mean, 4.0, 0.99, 1.0, 7.88)
    }

    #[test]
    fn json_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("params.json"));

        let mut params = fitted(45.5);
        params.extra.insert("room".into(), json!("A-102"));
        store.save(&params).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, params);
        assert!(!dir.path().join("params.json.tmp").exists());
    }

    #[test]
    fn json_load_nonexistent_returns_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing.json"));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.mean, None);
        assert_eq!(loaded.variance, None);
        assert!(!loaded.is_fitted());
    }

    #[test]
    fn json_load_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "{ \"mean\": 1.0, ").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AnomalyError::PersistenceError(_)));
    }

    #[test]
    fn json_load_wrong_shape_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(JsonFileStore::new(&path).load().is_err());
    }

    #[test]
    fn json_save_without_parent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("no").join("such").join("params.json"));
        let err = store.save(&fitted(1.0)).unwrap_err();
        assert!(matches!(err, AnomalyError::PersistenceError(_)));
    }

    #[test]
    fn json_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("params.json"));
        store.save(&fitted(1.0)).unwrap();
        store.save(&fitted(2.0)).unwrap();
        assert_eq!(store.load().unwrap().mean, Some(2.0));
    }

    #[test]
    fn json_file_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        JsonFileStore::new(&path).save(&fitted(1.0)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"mean\": 1.0,"));
    }

    #[test]
    fn in_memory_persistence() {
        let store = InMemoryStore::new();
        assert!(!store.load().unwrap().is_fitted());

        store.save(&fitted(42.0)).unwrap();
        assert_eq!(store.load().unwrap().mean, Some(42.0));
    }

    #[test]
    fn store_trait_object() {
        let store: Box<dyn ParameterStore> = Box::new(InMemoryStore::with_params(fitted(3.0)));
        assert!(store.load().unwrap().is_fitted());
    }
}
