// src/store/mod.rs
//! File-backed key-value persistence shared by the durable stores.
//!
//! Both stores (article history, fetch cache) are whole-file JSON maps: the
//! in-memory map is authoritative for one pipeline invocation and the file
//! is rewritten atomically (tmp + rename) at well-defined transition points.
//! A missing, unreadable or malformed file is a cold start, never a crash —
//! the degraded-run consequences are logged loudly instead.

pub mod fetch_cache;
pub mod history;

pub use fetch_cache::{CacheValidator, ConditionalFetchCache};
pub use history::{ArticleHistoryStore, FingerprintEntry};

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Whole-file JSON map keyed by string. Single-writer by construction: all
/// access is confined to the sequential pipeline.
#[derive(Debug)]
pub struct JsonFileStore<V> {
    path: PathBuf,
    map: BTreeMap<String, V>,
}

impl<V: Serialize + DeserializeOwned> JsonFileStore<V> {
    /// Load the store from `path`. Missing file is a normal first run;
    /// unreadable or malformed content degrades to an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "store file malformed, starting from an empty state"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "store file unreadable, starting from an empty state"
                );
                BTreeMap::new()
            }
        };
        Self { path, map }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace.
    pub fn put(&mut self, key: String, value: V) {
        self.map.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.map.remove(key)
    }

    pub fn retain(&mut self, f: impl FnMut(&String, &mut V) -> bool) {
        self.map.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole file atomically. The tmp file lands next to the
    /// target so the rename stays on one filesystem.
    pub fn persist(&self) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string(&self.map)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");

        let mut store: JsonFileStore<String> = JsonFileStore::load(&path);
        assert!(store.is_empty());
        store.put("a".into(), "1".into());
        store.put("b".into(), "2".into());
        store.persist().unwrap();

        let reloaded: JsonFileStore<String> = JsonFileStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn malformed_file_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let store: JsonFileStore<String> = JsonFileStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn persist_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/kv.json");

        let mut store: JsonFileStore<u32> = JsonFileStore::load(&path);
        store.put("x".into(), 7);
        store.persist().unwrap();
        assert!(path.exists());
    }
}
