use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::Route;
use crate::client::ApiClient;
use crate::session::{SessionEventRx, TokenStore};

/// Signed-in user indicator that follows store changes.
#[derive(Debug)]
pub struct NavBar {
    store: TokenStore,
    events: SessionEventRx,
    username: Option<String>,
}

impl NavBar {
    pub fn new(store: TokenStore) -> Self {
        let events = store.subscribe();
        let mut navbar = Self {
            store,
            events,
            username: None,
        };
        navbar.sync();
        navbar
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn sync(&mut self) {
        self.username = match self.store.user() {
            Ok(user) => user.map(|u| u.username),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "could not read stored user");
                None
            }
        };
    }

    /// Applies pending store notifications. Returns true if any arrived.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => changed = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if changed {
            self.sync();
        }
        changed
    }

    /// Waits for the next store notification and resynchronizes.
    pub async fn changed(&mut self) {
        match self.events.recv().await {
            Ok(_) | Err(RecvError::Lagged(_) | RecvError::Closed) => self.sync(),
        }
    }

    /// Invalidates the refresh token server-side, then always clears the
    /// local session.
    pub async fn logout(&mut self, client: &ApiClient) -> Route {
        match self.store.refresh_token() {
            Ok(Some(refresh)) => {
                if let Err(e) = client.auth().logout(&refresh).await {
                    tracing::warn!(error = %e, "server-side logout failed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "could not read refresh token"),
        }

        if let Err(e) = self.store.clear() {
            tracing::error!(error = %format!("{e:#}"), "failed to clear session");
        }
        self.sync();
        Route::Login
    }
}
