//! Per-user preferences and the sign-in session they hang off
//!
//! The frame only talks to the two traits here. `LocalAuth` and
//! `FilePreferenceStore` are the implementations the binary ships with.

pub mod sync;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

/// Key under which the default barcode type is stored
pub const DEFAULT_TYPE_KEY: &str = "defaultType";

pub type PrefsResult<T> = Result<T, PrefsError>;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("could not find a config directory for preferences")]
    NoConfigDir,

    #[error("preference file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("preference file {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Identity of a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Trimmed, non-empty, no inner whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of authentication state
pub trait AuthProvider: Send + Sync {
    /// Receiver that changes whenever a user signs in or out.
    /// Dropping it unsubscribes.
    fn subscribe(&self) -> watch::Receiver<Option<UserId>>;

    fn current_user(&self) -> Option<UserId>;
}

/// Remote key/value store of user preferences
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Value stored under `key`, `None` when never saved
    async fn load(&self, user: &UserId, key: &str) -> PrefsResult<Option<String>>;

    /// Merge `values` into the user's preferences
    async fn save(&self, user: &UserId, values: BTreeMap<String, String>) -> PrefsResult<()>;
}

/// In-process session: sign in and out by hand
pub struct LocalAuth {
    session: watch::Sender<Option<UserId>>,
}

impl LocalAuth {
    pub fn new(initial: Option<UserId>) -> Self {
        let (session, _) = watch::channel(initial);
        Self { session }
    }

    pub fn sign_in(&self, user: UserId) {
        tracing::info!("Signed in as {}", user);
        self.session.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.session.send_replace(None) {
            tracing::info!("Signed out {}", user);
        }
    }
}

impl AuthProvider for LocalAuth {
    fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.session.subscribe()
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.borrow().clone()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default)]
    users: BTreeMap<String, BTreeMap<String, String>>,
}

/// Preferences kept in a TOML file, one table per user
pub struct FilePreferenceStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<config_dir>/barcode-text/preferences.toml`
    pub fn default_path() -> PrefsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or(PrefsError::NoConfigDir)?;
        Ok(dir.join("barcode-text").join("preferences.toml"))
    }

    async fn read_file(&self) -> PrefsResult<PreferenceFile> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PreferenceFile::default()),
            Err(source) => {
                return Err(PrefsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| PrefsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_file(&self, file: &PreferenceFile) -> PrefsResult<()> {
        let io_err = |source| PrefsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let content = toml::to_string_pretty(file)?;
        tokio::fs::write(&self.path, content).await.map_err(io_err)
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn load(&self, user: &UserId, key: &str) -> PrefsResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let file = self.read_file().await?;
        Ok(file
            .users
            .get(user.as_str())
            .and_then(|prefs| prefs.get(key))
            .cloned())
    }

    async fn save(&self, user: &UserId, values: BTreeMap<String, String>) -> PrefsResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        file.users
            .entry(user.as_str().to_string())
            .or_default()
            .extend(values);
        self.write_file(&file).await?;
        tracing::debug!("Saved preferences for {} to {}", user, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(UserId::parse("  alice ").unwrap().as_str(), "alice");
        assert!(UserId::parse("").is_none());
        assert!(UserId::parse("   ").is_none());
        assert!(UserId::parse("a b").is_none());
    }

    #[test]
    fn test_local_auth_notifies_subscribers() {
        let auth = LocalAuth::new(None);
        let mut rx = auth.subscribe();
        assert_eq!(*rx.borrow_and_update(), None);

        auth.sign_in(user("alice"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(user("alice")));
        assert_eq!(auth.current_user(), Some(user("alice")));

        auth.sign_out();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), None);
        assert_eq!(auth.current_user(), None);
    }

    #[tokio::test]
    async fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs.toml"));
        let value = store.load(&user("alice"), DEFAULT_TYPE_KEY).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_save_then_load_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("nested").join("prefs.toml"));

        let values = BTreeMap::from([(DEFAULT_TYPE_KEY.to_string(), "Code128".to_string())]);
        store.save(&user("alice"), values).await.unwrap();

        assert_eq!(
            store.load(&user("alice"), DEFAULT_TYPE_KEY).await.unwrap().as_deref(),
            Some("Code128")
        );
        assert_eq!(store.load(&user("bob"), DEFAULT_TYPE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_merges_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs.toml"));

        store
            .save(&user("alice"), BTreeMap::from([("theme".to_string(), "dark".to_string())]))
            .await
            .unwrap();
        store
            .save(&user("alice"), BTreeMap::from([(DEFAULT_TYPE_KEY.to_string(), "QR".to_string())]))
            .await
            .unwrap();

        assert_eq!(store.load(&user("alice"), "theme").await.unwrap().as_deref(), Some("dark"));
        assert_eq!(store.load(&user("alice"), DEFAULT_TYPE_KEY).await.unwrap().as_deref(), Some("QR"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "users = [not toml").unwrap();

        let store = FilePreferenceStore::new(&path);
        let err = store.load(&user("alice"), DEFAULT_TYPE_KEY).await.unwrap_err();
        assert!(matches!(err, PrefsError::Parse { .. }));
    }
}
