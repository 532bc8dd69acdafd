use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Key-value store backed by `<dir>/<key>.json` files.
#[derive(Debug, Clone)]
pub struct PersistedStore {
    dir: PathBuf,
}

impl PersistedStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", key))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", key))?;
        Ok(Some(value))
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(self.path(key), contents)
            .with_context(|| format!("Failed to write state file: {}", key))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Load `key`, falling back to `default` on absence or corruption.
    pub fn load_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable persisted state");
                default
            }
        }
    }
}

/// A value mirrored to one key of a `PersistedStore`.
///
/// Without a store the value lives in memory only.
#[derive(Debug)]
pub struct Persisted<T> {
    key: &'static str,
    value: T,
    store: Option<PersistedStore>,
}

impl<T: Serialize + DeserializeOwned> Persisted<T> {
    pub fn load(store: Option<PersistedStore>, key: &'static str, default: T) -> Self {
        let value = match &store {
            Some(store) => store.load_or(key, default),
            None => default,
        };
        Self { key, value, store }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.write();
    }

    /// Change the value in place; written once after `f` returns.
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.write();
    }

    fn write(&self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.save(self.key, &self.value) {
            Ok(()) => debug!(key = self.key, "Persisted state"),
            Err(e) => warn!(key = self.key, error = %e, "Failed to persist state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CarQuery, SortOrder};
    use crate::store::{CARS_SEARCH_STATE_KEY, OWNERS_SEARCH_TERM_KEY};
    use tempfile::TempDir;

    fn store() -> (TempDir, PersistedStore) {
        let dir = TempDir::new().unwrap();
        let store = PersistedStore::new(dir.path().join("state")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_default_when_absent() {
        let (_dir, store) = store();
        let state = Persisted::load(Some(store), CARS_SEARCH_STATE_KEY, CarQuery::default());
        assert_eq!(*state.get(), CarQuery::default());
    }

    #[test]
    fn test_changes_survive_reload() {
        let (_dir, store) = store();
        let mut state = Persisted::load(Some(store.clone()), CARS_SEARCH_STATE_KEY, CarQuery::default());
        state.update(|q| {
            q.brand = Some("Toyota".into());
            q.sort_order = SortOrder::Desc;
            q.next_page();
        });

        let reloaded = Persisted::load(Some(store), CARS_SEARCH_STATE_KEY, CarQuery::default());
        assert_eq!(reloaded.get().brand.as_deref(), Some("Toyota"));
        assert_eq!(reloaded.get().sort_order, SortOrder::Desc);
        assert_eq!(reloaded.get().offset, 20);
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let (_dir, store) = store();
        std::fs::write(store.dir().join("ownersSearchTerm.json"), "{{{").unwrap();
        let term = Persisted::load(Some(store), OWNERS_SEARCH_TERM_KEY, String::from("fallback"));
        assert_eq!(term.get(), "fallback");
    }

    #[test]
    fn test_last_write_wins() {
        let (_dir, store) = store();
        let mut term = Persisted::load(Some(store.clone()), OWNERS_SEARCH_TERM_KEY, String::new());
        term.set("iv".into());
        term.set("ivan".into());
        assert_eq!(store.load::<String>(OWNERS_SEARCH_TERM_KEY).unwrap().as_deref(), Some("ivan"));
    }

    #[test]
    fn test_memory_only_value() {
        let mut term = Persisted::load(None, OWNERS_SEARCH_TERM_KEY, String::new());
        term.set("abc".into());
        assert_eq!(term.get(), "abc");
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = store();
        store.save("k", &1u32).unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.load::<u32>("k").unwrap(), None);
        store.remove("k").unwrap();
    }
}
