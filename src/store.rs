//! Key-value persistence used by the result and player adapters.
//!
//! Every operation is best-effort: a failed read looks like missing data and
//! a failed write is logged and forgotten. Nothing here may stall a race.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{SwipeError, SwipeResult};

pub trait KvStore {
    /// Parsed JSON under `key`, or `None` when absent or unreadable.
    fn get(&self, key: &str) -> Option<Value>;
    /// Store `value` under `key`. Failures are swallowed.
    fn set(&mut self, key: &str, value: &Value);
}

/// Typed read that degrades to `T::default()` on absent or malformed data.
pub fn get_or_default<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KvStore + ?Sized,
{
    match store.get(key) {
        None => T::default(),
        Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
            warn!("store: '{key}' has unexpected shape ({e}); using empty default");
            T::default()
        }),
    }
}

/// In-process store. Values are kept as JSON text, so corrupt data can be
/// planted with `insert_raw`.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&mut self, key: &str, text: &str) {
        self.entries.insert(key.to_string(), text.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let text = self.entries.get(key)?;
        match serde_json::from_str(text) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("store: '{key}' is not valid json: {e}");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &Value) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> SwipeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> SwipeResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SwipeError::Validation(format!("invalid store key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn read(&self, key: &str) -> SwipeResult<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let txt = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&txt)?))
    }

    fn write(&self, key: &str, value: &Value) -> SwipeResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.read(key).unwrap_or_else(|e| {
            warn!("store: read of '{key}' failed: {e}");
            None
        })
    }

    fn set(&mut self, key: &str, value: &Value) {
        if let Err(e) = self.write(key, value) {
            warn!("store: write of '{key}' failed: {e}");
        }
    }
}
