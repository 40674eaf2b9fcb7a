//! Session state: persisted tokens and the signed-in user.
//!
//! A session exists while a refresh token is stored. Every write is
//! persisted first and then announced on a broadcast channel, so a
//! subscriber that receives an event always reads the new value.

mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

pub use storage::{FileStore, KeyValueStore, MemoryStore};

use crate::config::paths;
use crate::logging::mask_token;
use crate::models::{AuthTokens, User};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Change notification emitted after every store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Access token (and possibly refresh token) was written.
    TokensChanged,
    /// Cached user record was written.
    UserChanged,
    /// All session keys were removed.
    Cleared,
}

pub type SessionEventRx = broadcast::Receiver<SessionEvent>;

struct Inner {
    backend: Box<dyn KeyValueStore>,
    events: broadcast::Sender<SessionEvent>,
}

/// Shared handle to the token store. Clones share state and subscribers.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend: Box::new(backend),
                events,
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Opens the file-backed store at `<home>/session.json`.
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be resolved.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(FileStore::new(paths::session_path()?)))
    }

    /// Registers a listener for subsequent mutations.
    pub fn subscribe(&self) -> SessionEventRx {
        self.inner.events.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    /// # Errors
    /// Returns an error if the backing store cannot be read.
    pub fn access_token(&self) -> Result<Option<String>> {
        self.inner.backend.get(ACCESS_TOKEN_KEY)
    }

    /// # Errors
    /// Returns an error if the backing store cannot be read.
    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.inner.backend.get(REFRESH_TOKEN_KEY)
    }

    /// Returns the cached user record, if any.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or the record is corrupt.
    pub fn user(&self) -> Result<Option<User>> {
        let Some(raw) = self.inner.backend.get(USER_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .context("Failed to parse stored user record")
    }

    /// True while a refresh token is stored.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    pub fn has_session(&self) -> Result<bool> {
        Ok(self
            .refresh_token()?
            .is_some_and(|token| !token.trim().is_empty()))
    }

    /// Stores a full token pair.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written.
    pub fn set_tokens(&self, tokens: &AuthTokens) -> Result<()> {
        self.inner.backend.set_many(&[
            (ACCESS_TOKEN_KEY, &tokens.access),
            (REFRESH_TOKEN_KEY, &tokens.refresh),
        ])?;
        tracing::debug!(access = %mask_token(&tokens.access), "stored token pair");
        self.notify(SessionEvent::TokensChanged);
        Ok(())
    }

    /// Replaces only the access token (after a refresh).
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written.
    pub fn set_access_token(&self, access: &str) -> Result<()> {
        self.inner.backend.set(ACCESS_TOKEN_KEY, access)?;
        tracing::debug!(access = %mask_token(access), "stored refreshed access token");
        self.notify(SessionEvent::TokensChanged);
        Ok(())
    }

    /// # Errors
    /// Returns an error if the user cannot be serialized or stored.
    pub fn set_user(&self, user: &User) -> Result<()> {
        let raw = serde_json::to_string(user).context("Failed to serialize user record")?;
        self.inner.backend.set(USER_KEY, &raw)?;
        tracing::debug!(user = %user.username, "stored user record");
        self.notify(SessionEvent::UserChanged);
        Ok(())
    }

    /// Removes tokens and user in one write.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written.
    pub fn clear(&self) -> Result<()> {
        self.inner
            .backend
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])?;
        tracing::debug!("cleared session");
        self.notify(SessionEvent::Cleared);
        Ok(())
    }
}
