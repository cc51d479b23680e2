//! Bearer-token session and its durable storage.
//!
//! [`AuthSession`] is the single mutable cell holding the access token and the
//! cached user profile. It is shared by reference (`Arc<AuthSession>`) with
//! every component that issues authorized requests. Writes are single-field
//! replacements with last-writer-wins semantics.
//!
//! Invalidation is keyed on the token a request was sent with: a 401 only
//! tears the session down if that token is still current. Several concurrent
//! requests failing with the same token therefore produce exactly one
//! [`ConsoleEvent::LoginRequired`], and a late 401 for an old token never logs
//! out a freshly signed-in user.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use aquasense_types::UserProfile;

use crate::error::{Error, Result};
use crate::events::{ConsoleEvent, EventDispatcher};

/// What is kept in durable client storage, under the keys `accessToken` and
/// `userData`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(
        rename = "accessToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<String>,
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserProfile>,
}

/// Durable key-value storage for the session.
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Load the stored session. A missing store is an empty session.
    fn load(&self) -> Result<PersistedSession>;

    /// Replace the stored session.
    fn save(&self, session: &PersistedSession) -> Result<()>;

    /// Remove token and user together.
    fn clear(&self) -> Result<()>;
}

/// Session stored as a JSON file, by default `<config_dir>/aquasense/session.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location.
    pub fn default_location() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("aquasense").join("session.json")))
            .ok_or_else(|| Error::Storage("no configuration directory on this platform".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<PersistedSession> {
        if !self.path.exists() {
            return Ok(PersistedSession::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory session store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<PersistedSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a session, as if persisted by an earlier run.
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Copy of what is currently stored.
    pub fn stored(&self) -> PersistedSession {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<PersistedSession> {
        Ok(self.stored())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = PersistedSession::default();
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserProfile>,
}

impl SessionState {
    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            access_token: self.token.clone(),
            user_data: self.user.clone(),
        }
    }
}

/// The bearer-token session.
#[derive(Debug)]
pub struct AuthSession {
    state: RwLock<SessionState>,
    store: Arc<dyn SessionStore>,
    events: EventDispatcher,
}

impl AuthSession {
    /// Create an empty session backed by `store`. Call [`restore`](Self::restore)
    /// to pick up a previously persisted token.
    pub fn new(store: Arc<dyn SessionStore>, events: EventDispatcher) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            store,
            events,
        }
    }

    /// Empty session with an in-memory store and its own event dispatcher.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), EventDispatcher::default())
    }

    /// Load token and user from the store. Returns `true` if a token was found.
    pub async fn restore(&self) -> Result<bool> {
        let persisted = self.store.load()?;
        let mut state = self.state.write().await;
        state.token = persisted.access_token.filter(|t| !t.is_empty());
        state.user = persisted.user_data;
        debug!(authenticated = state.token.is_some(), "Session restored");
        Ok(state.token.is_some())
    }

    /// Current token. An empty token reads as `None`.
    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    /// Replace the token and persist it.
    pub async fn set_token(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        let mut state = self.state.write().await;
        state.token = (!token.is_empty()).then_some(token);
        self.store.save(&state.persisted())
    }

    /// Cached user profile, if any.
    pub async fn user(&self) -> Option<UserProfile> {
        self.state.read().await.user.clone()
    }

    /// Cache the signed-in user's profile and persist it.
    pub async fn set_user(&self, user: UserProfile) -> Result<()> {
        let mut state = self.state.write().await;
        state.user = Some(user);
        self.store.save(&state.persisted())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.token.is_some()
    }

    /// Drop token and user, locally and in the store.
    ///
    /// Local state is always cleared; a storage failure is only logged.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = SessionState::default();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    /// Tear the session down after an authorization failure on a request
    /// that carried `sent_token`.
    ///
    /// Only acts if `sent_token` is still the current token. Returns `true`
    /// if this call cleared the session (and emitted `LoginRequired`).
    pub async fn invalidate_if_current(&self, sent_token: &str, reason: &str) -> bool {
        let mut state = self.state.write().await;
        if state.token.as_deref() != Some(sent_token) {
            debug!("Ignoring authorization failure for a token that is no longer current");
            return false;
        }
        *state = SessionState::default();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        drop(state);

        info!(reason, "Session invalidated; login required");
        self.events.send(ConsoleEvent::LoginRequired {
            reason: reason.to_string(),
        });
        true
    }

    /// Dispatcher this session reports to.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }
}
