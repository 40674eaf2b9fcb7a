use serde_json::json;

use crate::client::{ApiClient, ApiRequest, ApiResult, LOGIN_PATH, REGISTER_PATH};
use crate::models::{AuthResponse, LoginCredentials, RegisterData, User};

pub const LOGOUT_PATH: &str = "auth/logout/";
pub const USER_PATH: &str = "auth/user/";

/// Account endpoints.
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchanges credentials for a user record and token pair.
    ///
    /// # Errors
    /// A rejected login is returned unchanged; it never triggers a refresh.
    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthResponse> {
        let request = ApiRequest::post(LOGIN_PATH).json(credentials)?;
        self.client.fetch(&request).await
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    /// Field validation failures surface as `Validation` errors.
    pub async fn register(&self, data: &RegisterData) -> ApiResult<AuthResponse> {
        let request = ApiRequest::post(REGISTER_PATH).json(data)?;
        self.client.fetch(&request).await
    }

    /// Invalidates the given refresh token server-side.
    ///
    /// # Errors
    /// Returns pipeline errors.
    pub async fn logout(&self, refresh: &str) -> ApiResult<()> {
        let request = ApiRequest::post(LOGOUT_PATH).json(&json!({ "refresh": refresh }))?;
        self.client.execute(&request).await
    }

    /// # Errors
    /// Returns pipeline errors.
    pub async fn current_user(&self) -> ApiResult<User> {
        self.client.fetch(&ApiRequest::get(USER_PATH)).await
    }
}
