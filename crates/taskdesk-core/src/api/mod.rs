//! Typed request functions for the auth and task endpoints.
//!
//! Each function builds an [`ApiRequest`](crate::client::ApiRequest) and
//! runs it through the shared pipeline, so token attachment and refresh
//! apply uniformly.

mod auth;
mod tasks;

pub use auth::{AuthApi, LOGOUT_PATH, USER_PATH};
pub use tasks::{TASKS_PATH, TasksApi};

use crate::client::ApiClient;

impl ApiClient {
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(self)
    }
}
