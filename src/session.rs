//! Client-side session ownership.
//!
//! [`SessionContext`] is the single owner of the signed-in [`Session`]. It is
//! cheap to clone and is passed explicitly to the flows that need it. Readers
//! get snapshots; writers replace the session wholesale, so a token without a
//! role (or the reverse) is never observable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::{AccessToken, Role, User};

/// Proof of authentication: a non-empty access token plus the user it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    token: AccessToken,
    user: User,
}

impl Session {
    /// Pair a token with its user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the token is empty.
    pub fn new(token: impl Into<AccessToken>, user: User) -> Result<Self, Error> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::Validation("access token must not be empty".into()));
        }
        Ok(Self { token, user })
    }

    /// Bearer token.
    #[must_use]
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Signed-in user.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Signed-in user's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Persistent backing for the session (browser local storage, a file, ...).
///
/// Implementations only store and fetch; validation happens in
/// [`SessionContext`].
pub trait SessionStorage: Send + Sync + 'static {
    /// Load a previously saved session. Unreadable or partial data is `None`.
    fn load(&self) -> Result<Option<Session>, Error>;

    fn save(&self, session: &Session) -> Result<(), Error>;

    fn clear(&self) -> Result<(), Error>;
}

/// Storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<Session>>,
}

impl MemoryStorage {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Session>, Error> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.slot() = None;
        Ok(())
    }
}

/// On-disk layout, keyed like the web client's local storage entries.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<serde_json::Value>,
}

impl StoredSession {
    fn into_session(self) -> Option<Session> {
        let token = self.access_token?;
        let user = serde_json::from_value::<User>(self.user?).ok()?;
        Session::new(token, user).ok()
    }
}

/// Session persisted as a small JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Store at `path`. Nothing is read until `load`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the session is kept in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<Session>, Error> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        };
        match serde_json::from_slice::<StoredSession>(&raw) {
            Ok(stored) => Ok(stored.into_session()),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable session file"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        let stored = StoredSession {
            access_token: Some(session.token().as_str().to_owned()),
            user: Some(
                serde_json::to_value(session.user())
                    .map_err(|e| Error::Storage(e.to_string()))?,
            ),
        };
        let body = serde_json::to_vec(&stored).map_err(|e| Error::Storage(e.to_string()))?;

        // Write-then-rename so a crash never leaves half a session on disk.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<(), Error> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}

struct Inner {
    storage: Mutex<Box<dyn SessionStorage>>,
    state: watch::Sender<Option<Session>>,
}

/// Injectable owner of the current session.
///
/// Starts empty, is populated by a sign-in flow, and is emptied by
/// [`clear`](Self::clear) on logout or when the API rejects the token.
/// Subscribers are notified on every change.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionContext {
    /// Empty context backed by `storage`. Nothing is loaded.
    #[must_use]
    pub fn new(storage: impl SessionStorage) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                storage: Mutex::new(Box::new(storage)),
                state,
            }),
        }
    }

    /// Empty context that forgets the session on exit.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Context seeded from whatever `storage` already holds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store cannot be read.
    pub fn restore(storage: impl SessionStorage) -> Result<Self, Error> {
        let existing = storage.load()?;
        let ctx = Self::new(storage);
        ctx.inner.state.send_replace(existing);
        Ok(ctx)
    }

    /// Restore from the configured session file, or start in memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session file cannot be read.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        match config.session_file() {
            Some(path) => Self::restore(JsonFileStorage::new(path.clone())),
            None => Ok(Self::in_memory()),
        }
    }

    fn storage(&self) -> MutexGuard<'_, Box<dyn SessionStorage>> {
        self.inner.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.inner.state.borrow().clone()
    }

    /// True while a session is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    /// Token of the current session.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.inner.state.borrow().as_ref().map(|s| s.token.clone())
    }

    /// User of the current session.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Role of the current session.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.inner.state.borrow().as_ref().map(Session::role)
    }

    /// Replace the current session. Persisted first; memory is only updated
    /// once the store accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if persisting fails. The previous session
    /// stays in place.
    pub fn establish(&self, session: Session) -> Result<(), Error> {
        let storage = self.storage();
        storage.save(&session)?;
        tracing::debug!(role = %session.role(), "Session established");
        self.inner.state.send_replace(Some(session));
        Ok(())
    }

    /// Swap the token of the current session after a refresh.
    ///
    /// Returns `false` (and changes nothing) when there is no session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty token and
    /// [`Error::Storage`] if persisting fails.
    pub fn rotate_token(&self, token: AccessToken) -> Result<bool, Error> {
        let storage = self.storage();
        let Some(current) = self.inner.state.borrow().clone() else {
            return Ok(false);
        };
        let next = Session::new(token, current.user)?;
        storage.save(&next)?;
        self.inner.state.send_replace(Some(next));
        Ok(true)
    }

    /// Drop the session. Memory is always cleared, even if the backing store fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store could not be cleared.
    pub fn clear(&self) -> Result<(), Error> {
        let storage = self.storage();
        let had_session = self.inner.state.send_replace(None).is_some();
        if had_session {
            tracing::debug!("Session cleared");
        }
        storage.clear()
    }

    /// Change feed: yields the new session (or `None`) after every write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.state.subscribe()
    }
}
