use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Default maximum age of a persisted token in hours.
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 12;

/// Persistent home of the bearer token between runs.
pub trait TokenStore: Send + Sync {
    /// The stored token, or `None` when absent or no longer usable.
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    /// Remove the token. Removing an absent token succeeds.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    saved_at: DateTime<Utc>,
}

impl StoredToken {
    fn is_expired(&self, max_age: Duration) -> bool {
        Utc::now() > self.saved_at + max_age
    }
}

/// Token kept in `session.json` under the cache directory.
pub struct FileTokenStore {
    cache_dir: PathBuf,
    max_age: Duration,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            max_age: Duration::hours(DEFAULT_SESSION_MAX_AGE_HOURS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let stored: StoredToken = match serde_json::from_str(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                debug!(error = %e, "Discarding unreadable session file");
                self.clear()?;
                return Ok(None);
            }
        };

        if stored.is_expired(self.max_age) {
            debug!(saved_at = %stored.saved_at, "Discarding expired session token");
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(stored.token))
    }

    fn save(&self, token: &str) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredToken {
            token: token.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Token held only for the lifetime of the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a coherent Option
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf());

        assert_eq!(store.load().unwrap(), None);
        store.save("tok-1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("tok-1"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(!dir.path().join(SESSION_FILE).exists());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_discards_expired_token() {
        let dir = TempDir::new().unwrap();
        let stored = StoredToken {
            token: "old".into(),
            saved_at: Utc::now() - Duration::hours(13),
        };
        std::fs::write(
            dir.path().join(SESSION_FILE),
            serde_json::to_string(&stored).unwrap(),
        )
        .unwrap();

        let store = FileTokenStore::new(dir.path().to_path_buf());
        assert_eq!(store.load().unwrap(), None);
        assert!(!dir.path().join(SESSION_FILE).exists());
    }

    #[test]
    fn test_file_store_respects_custom_max_age() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).with_max_age(Duration::hours(48));
        let stored = StoredToken {
            token: "recent-enough".into(),
            saved_at: Utc::now() - Duration::hours(13),
        };
        std::fs::write(
            dir.path().join(SESSION_FILE),
            serde_json::to_string(&stored).unwrap(),
        )
        .unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("recent-enough"));
    }

    #[test]
    fn test_file_store_discards_corrupt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_token("abc");
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.save("def").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("def"));
    }
}
