//! Default barcode type, kept in step with the signed-in user
//!
//! Anonymous sessions always use [`Symbology::FALLBACK`]. Signing in starts
//! a background load of the user's stored default; signing out resets it.
//! Changes made while signed in are written back without waiting for the
//! store, and a failed write is only logged.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{PreferenceStore, UserId, DEFAULT_TYPE_KEY};
use crate::barcode::Symbology;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(UserId),
}

/// Result of a background load, tagged with who it was loaded for and
/// the epoch it was started in
#[derive(Debug)]
struct LoadedDefault {
    epoch: u64,
    user: UserId,
    value: Option<String>,
}

pub struct DefaultTypeSync {
    state: AuthState,
    default_type: Symbology,
    /// Bumped on every auth change and local edit; older loads are stale
    epoch: u64,
    store: Arc<dyn PreferenceStore>,
    loaded_tx: mpsc::UnboundedSender<LoadedDefault>,
    loaded_rx: mpsc::UnboundedReceiver<LoadedDefault>,
}

impl DefaultTypeSync {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        Self {
            state: AuthState::Anonymous,
            default_type: Symbology::FALLBACK,
            epoch: 0,
            store,
            loaded_tx,
            loaded_rx,
        }
    }

    pub fn default_type(&self) -> Symbology {
        self.default_type
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&UserId> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Anonymous => None,
        }
    }

    /// React to a sign-in (`Some`) or sign-out (`None`) notification
    pub fn on_auth_changed(&mut self, user: Option<UserId>) {
        self.epoch += 1;
        match user {
            Some(user) => {
                tracing::debug!("Loading default type for {}", user);
                self.state = AuthState::Authenticated(user.clone());
                self.spawn_load(user);
            }
            None => {
                self.state = AuthState::Anonymous;
                self.default_type = Symbology::FALLBACK;
            }
        }
    }

    fn spawn_load(&self, user: UserId) {
        let store = Arc::clone(&self.store);
        let tx = self.loaded_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let value = match store.load(&user, DEFAULT_TYPE_KEY).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Failed to load default type for {}: {}", user, e);
                    return;
                }
            };
            // Receiver is gone once the frame is torn down
            let _ = tx.send(LoadedDefault { epoch, user, value });
        });
    }

    /// Apply finished loads. Returns true when the default type changed.
    pub fn poll_loaded(&mut self) -> bool {
        let mut changed = false;
        while let Ok(loaded) = self.loaded_rx.try_recv() {
            changed |= self.apply_loaded(loaded);
        }
        changed
    }

    fn apply_loaded(&mut self, loaded: LoadedDefault) -> bool {
        if loaded.epoch != self.epoch || self.user() != Some(&loaded.user) {
            tracing::debug!("Dropping stale default type load for {}", loaded.user);
            return false;
        }

        let Some(raw) = loaded.value else {
            return false;
        };

        match raw.parse::<Symbology>() {
            Ok(symbology) => {
                let changed = symbology != self.default_type;
                self.default_type = symbology;
                changed
            }
            Err(e) => {
                tracing::warn!("Ignoring stored default type for {}: {}", loaded.user, e);
                false
            }
        }
    }

    /// Change the default type; when signed in, also write it to the store.
    ///
    /// The returned handle is the background save, if one was started.
    /// Nothing waits on it.
    pub fn set_default_type(&mut self, symbology: Symbology) -> Option<JoinHandle<()>> {
        self.default_type = symbology;
        // A load still in flight must not overwrite this choice
        self.epoch += 1;

        let user = self.user()?.clone();
        let store = Arc::clone(&self.store);
        let values = BTreeMap::from([(DEFAULT_TYPE_KEY.to_string(), symbology.as_str().to_string())]);

        Some(tokio::spawn(async move {
            if let Err(e) = store.save(&user, values).await {
                tracing::warn!("Failed to save default type for {}: {}", user, e);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{PrefsError, PrefsResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Store backed by a map; `fail_saves` makes every save error out
    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<BTreeMap<(String, String), String>>,
        fail_saves: bool,
    }

    impl MemoryStore {
        fn with(user: &str, value: &str) -> Self {
            let store = Self::default();
            store
                .values
                .lock()
                .unwrap()
                .insert((user.to_string(), DEFAULT_TYPE_KEY.to_string()), value.to_string());
            store
        }

        fn get(&self, user: &str) -> Option<String> {
            self.values
                .lock()
                .unwrap()
                .get(&(user.to_string(), DEFAULT_TYPE_KEY.to_string()))
                .cloned()
        }
    }

    #[async_trait]
    impl PreferenceStore for MemoryStore {
        async fn load(&self, user: &UserId, key: &str) -> PrefsResult<Option<String>> {
            Ok(self
                .values
                .lock()
                .unwrap()
                .get(&(user.as_str().to_string(), key.to_string()))
                .cloned())
        }

        async fn save(&self, user: &UserId, values: BTreeMap<String, String>) -> PrefsResult<()> {
            if self.fail_saves {
                return Err(PrefsError::NoConfigDir);
            }
            let mut map = self.values.lock().unwrap();
            for (key, value) in values {
                map.insert((user.as_str().to_string(), key), value);
            }
            Ok(())
        }
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    /// Wait for the next background load and apply it
    async fn settle(sync: &mut DefaultTypeSync) -> bool {
        let loaded = sync.loaded_rx.recv().await.unwrap();
        sync.apply_loaded(loaded)
    }

    #[tokio::test]
    async fn test_starts_anonymous_with_fallback() {
        let sync = DefaultTypeSync::new(Arc::new(MemoryStore::default()));
        assert_eq!(sync.state(), &AuthState::Anonymous);
        assert_eq!(sync.default_type(), Symbology::Qr);
    }

    #[tokio::test]
    async fn test_sign_in_loads_stored_default() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::with("alice", "Code128")));
        sync.on_auth_changed(Some(user("alice")));
        assert_eq!(sync.state(), &AuthState::Authenticated(user("alice")));

        assert!(settle(&mut sync).await);
        assert_eq!(sync.default_type(), Symbology::Code128);
    }

    #[tokio::test]
    async fn test_sign_in_without_stored_value_keeps_default() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::default()));
        sync.on_auth_changed(Some(user("alice")));
        assert!(!settle(&mut sync).await);
        assert_eq!(sync.default_type(), Symbology::Qr);
    }

    #[tokio::test]
    async fn test_unknown_stored_value_is_ignored() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::with("alice", "PDF417")));
        sync.on_auth_changed(Some(user("alice")));
        assert!(!settle(&mut sync).await);
        assert_eq!(sync.default_type(), Symbology::Qr);
    }

    #[tokio::test]
    async fn test_sign_out_resets_to_fallback() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::with("alice", "Code128")));
        sync.on_auth_changed(Some(user("alice")));
        settle(&mut sync).await;
        assert_eq!(sync.default_type(), Symbology::Code128);

        sync.on_auth_changed(None);
        assert_eq!(sync.state(), &AuthState::Anonymous);
        assert_eq!(sync.default_type(), Symbology::Qr);
    }

    #[tokio::test]
    async fn test_load_finishing_after_sign_out_is_dropped() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::with("alice", "Code128")));
        sync.on_auth_changed(Some(user("alice")));
        sync.on_auth_changed(None);

        assert!(!settle(&mut sync).await);
        assert_eq!(sync.default_type(), Symbology::Qr);
    }

    #[tokio::test]
    async fn test_load_finishing_after_local_change_is_dropped() {
        let store = Arc::new(MemoryStore::with("alice", "Code128"));
        let mut sync = DefaultTypeSync::new(store.clone());
        sync.on_auth_changed(Some(user("alice")));

        let loaded = sync.loaded_rx.recv().await.unwrap();
        let save = sync.set_default_type(Symbology::Qr).expect("save started");
        save.await.unwrap();

        assert!(!sync.apply_loaded(loaded));
        assert_eq!(sync.default_type(), Symbology::Qr);
        assert_eq!(store.get("alice").as_deref(), Some("QR"));
    }

    #[tokio::test]
    async fn test_load_for_previous_user_is_dropped_after_switch() {
        let store = Arc::new(MemoryStore::with("alice", "Code128"));
        let mut sync = DefaultTypeSync::new(store);
        sync.on_auth_changed(Some(user("alice")));
        sync.on_auth_changed(Some(user("bob")));

        // alice's load and bob's (empty) load, in either order
        assert!(!settle(&mut sync).await);
        assert!(!settle(&mut sync).await);
        assert_eq!(sync.state(), &AuthState::Authenticated(user("bob")));
        assert_eq!(sync.default_type(), Symbology::Qr);
    }

    #[tokio::test]
    async fn test_relogin_same_user_ignores_first_load() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::with("alice", "Code128")));
        sync.on_auth_changed(Some(user("alice")));
        let first = sync.loaded_rx.recv().await.unwrap();
        sync.on_auth_changed(None);
        sync.on_auth_changed(Some(user("alice")));

        assert!(!sync.apply_loaded(first));
        assert!(settle(&mut sync).await);
        assert_eq!(sync.default_type(), Symbology::Code128);
    }

    #[tokio::test]
    async fn test_change_while_signed_in_is_saved() {
        let store = Arc::new(MemoryStore::default());
        let mut sync = DefaultTypeSync::new(store.clone());
        sync.on_auth_changed(Some(user("alice")));
        settle(&mut sync).await;

        let save = sync.set_default_type(Symbology::Code128).expect("save started");
        save.await.unwrap();

        assert_eq!(sync.default_type(), Symbology::Code128);
        assert_eq!(store.get("alice").as_deref(), Some("Code128"));
    }

    #[tokio::test]
    async fn test_change_while_anonymous_is_local_only() {
        let store = Arc::new(MemoryStore::default());
        let mut sync = DefaultTypeSync::new(store.clone());

        assert!(sync.set_default_type(Symbology::Code128).is_none());
        assert_eq!(sync.default_type(), Symbology::Code128);
        assert!(store.values.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_local_value() {
        let store = Arc::new(MemoryStore {
            fail_saves: true,
            ..Default::default()
        });
        let mut sync = DefaultTypeSync::new(store);
        sync.on_auth_changed(Some(user("alice")));
        settle(&mut sync).await;

        let save = sync.set_default_type(Symbology::Code128).expect("save started");
        save.await.unwrap();
        assert_eq!(sync.default_type(), Symbology::Code128);
    }

    #[tokio::test]
    async fn test_poll_applies_finished_loads() {
        let mut sync = DefaultTypeSync::new(Arc::new(MemoryStore::with("alice", "Code128")));
        sync.on_auth_changed(Some(user("alice")));

        let loaded = sync.loaded_rx.recv().await.unwrap();
        sync.loaded_tx.send(loaded).unwrap();
        assert!(sync.poll_loaded());
        assert!(!sync.poll_loaded());
        assert_eq!(sync.default_type(), Symbology::Code128);
    }
}
