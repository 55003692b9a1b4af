use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::StoreError;

/// A JSON document stored in a single file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    /// Loads the document, falling back to `T::default()` when it is missing
    /// or unreadable.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self) -> T {
        match self.load() {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Ignoring unreadable store file");
                T::default()
            }
        }
    }

    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(value)?;
        write_atomic(&self.path, &raw)
    }

    /// Serialises `value` now and writes it in the background.
    ///
    /// Concurrent saves race; the last one to land wins. Outside a Tokio
    /// runtime the write happens inline. Failures are logged, never returned.
    pub fn save_detached<T: Serialize>(&self, value: &T) -> Option<JoinHandle<()>> {
        let raw = match serde_json::to_string_pretty(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to encode store file");
                return None;
            }
        };
        let path = self.path.clone();
        detach(move || {
            if let Err(err) = write_atomic(&path, &raw) {
                warn!(error = %err, "Background store write failed");
            } else {
                debug!(path = %path.display(), "Store file written");
            }
        })
    }
}

/// Appends one line to `path` in the background, creating parent directories.
pub fn append_line_detached(path: PathBuf, line: String) -> Option<JoinHandle<()>> {
    detach(move || {
        if let Err(err) = append_line(&path, &line) {
            warn!(error = %err, "Background append failed");
        }
    })
}

pub(crate) fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| StoreError::io(path, err))?;
    writeln!(file, "{line}").map_err(|err| StoreError::io(path, err))
}

fn detach<F>(job: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn_blocking(job)),
        Err(_) => {
            job();
            None
        }
    }
}

fn write_atomic(path: &Path, raw: &str) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, raw).map_err(|err| StoreError::io(&tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| StoreError::io(path, err))
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFile::new(dir.path().join("absent.json"));
        let loaded: Option<BTreeMap<String, u32>> = store.load().expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");
        let loaded: BTreeMap<String, u32> = JsonFile::new(path).load_or_default();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn detached_save_lands_on_disk() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFile::new(dir.path().join("nested/stats.json"));
        let mut value = BTreeMap::new();
        value.insert("calls".to_string(), 3u32);

        store
            .save_detached(&value)
            .expect("inside runtime")
            .await
            .expect("join");

        let loaded: BTreeMap<String, u32> = store.load().expect("load").expect("present");
        assert_eq!(loaded, value);
    }

    #[test]
    fn appends_accumulate_lines() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("log/a.jsonl");
        append_line(&path, "one").expect("append");
        append_line(&path, "two").expect("append");
        assert_eq!(fs::read_to_string(&path).expect("read"), "one\ntwo\n");
    }
}
