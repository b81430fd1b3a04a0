//! Per-task form value cache
//!
//! Stores the last set of argument values used for each task, keyed by task
//! name, so a later run can restore them. The contract is deliberately thin:
//! save a `code → value` mapping, get the same shape back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No usable data directory for the value cache")]
    NoDataDir,
    #[error("Unable to read value cache {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to write value cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt value cache {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    tasks: HashMap<String, HashMap<String, String>>,
}

/// JSON-backed store of saved argument values
pub struct ValueCache {
    path: PathBuf,
}

impl ValueCache {
    /// Cache in the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NoDataDir` when no home directory is available.
    pub fn open_default() -> Result<Self, CacheError> {
        let dirs = ProjectDirs::from("", "", "runbook").ok_or(CacheError::NoDataDir)?;
        Ok(Self::at(dirs.data_dir().join("values.json")))
    }

    /// Cache backed by an explicit file path
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        ValueCache { path: path.into() }
    }

    fn read(&self) -> Result<CacheFile, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
                    path: self.path.clone(),
                    source,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CacheFile::default()),
            Err(source) => Err(CacheError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Restore the saved values for a task, if any were saved.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache file is unreadable or corrupt.
    pub fn restore(&self, task: &str) -> Result<Option<HashMap<String, String>>, CacheError> {
        Ok(self.read()?.tasks.remove(task))
    }

    /// Save the values for a task, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache file cannot be read or written.
    pub fn save(&self, task: &str, values: &HashMap<String, String>) -> Result<(), CacheError> {
        let mut cache = self.read()?;
        cache.tasks.insert(task.to_string(), values.clone());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let contents = serde_json::to_string_pretty(&cache).map_err(|source| {
            CacheError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        debug!("Saving values for task '{}' to {}", task, self.path.display());
        std::fs::write(&self.path, contents).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ValueCache::at(dir.path().join("values.json"));
        let values = HashMap::from([
            ("INPUT".to_string(), "input.txt".to_string()),
            ("DEBUG".to_string(), "1".to_string()),
        ]);
        cache.save("build", &values).unwrap();
        assert_eq!(cache.restore("build").unwrap(), Some(values));
    }

    #[test]
    fn test_missing_task_restores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ValueCache::at(dir.path().join("values.json"));
        assert_eq!(cache.restore("unknown").unwrap(), None);
    }

    #[test]
    fn test_save_replaces_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ValueCache::at(dir.path().join("values.json"));
        cache
            .save("t", &HashMap::from([("A".to_string(), "1".to_string())]))
            .unwrap();
        cache
            .save("t", &HashMap::from([("B".to_string(), "2".to_string())]))
            .unwrap();
        let restored = cache.restore("t").unwrap().unwrap();
        assert!(!restored.contains_key("A"));
        assert_eq!(restored.get("B").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_corrupt_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.json");
        std::fs::write(&path, "not json").unwrap();
        let cache = ValueCache::at(&path);
        assert!(matches!(cache.restore("t"), Err(CacheError::Corrupt { .. })));
    }
}
