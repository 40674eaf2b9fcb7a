//! Page state and flows.
//!
//! Each page owns its local UI state (form values, loading flags, filter
//! selection, delete confirmation) and drives the API functions. Flows
//! that navigate return the [`Route`] to show next; front-ends decide how
//! to render it.

mod auth;
mod dashboard;
mod navbar;
mod task_form;

pub use auth::{LoginPage, RegisterPage, establish_session};
pub use dashboard::{Dashboard, StatusCounts, TaskFilter};
pub use navbar::NavBar;
pub use task_form::{FormMode, NOT_FOUND_MESSAGE, TaskForm};

use crate::session::TokenStore;

/// Navigation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    NewTask,
    EditTask(i64),
}

/// Lifecycle of data a page fetches on mount.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState<T> {
    #[default]
    Loading,
    Loaded(T),
    NotFound,
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Returns the login route when no session is stored.
///
/// An unreadable store counts as signed out.
pub fn require_session(store: &TokenStore) -> Option<Route> {
    match store.has_session() {
        Ok(true) => None,
        Ok(false) => Some(Route::Login),
        Err(e) => {
            tracing::warn!(
                error = %format!("{e:#}"),
                "could not read session, treating as signed out"
            );
            Some(Route::Login)
        }
    }
}
