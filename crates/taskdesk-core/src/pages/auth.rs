use std::fmt;

use anyhow::Result;

use super::Route;
use crate::client::ApiClient;
use crate::models::{AuthResponse, LoginCredentials, RegisterData, User};
use crate::session::TokenStore;

/// Persists a fresh token pair and the signed-in user.
///
/// # Errors
/// Returns an error if the store cannot be written.
pub fn establish_session(store: &TokenStore, response: AuthResponse) -> Result<User> {
    let (user, tokens) = response.into_parts();
    store.set_tokens(&tokens)?;
    store.set_user(&user)?;
    tracing::info!(user = %user.username, "signed in");
    Ok(user)
}

/// Email/password sign-in form.
#[derive(Clone, Default)]
pub struct LoginPage {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub loading: bool,
}

impl fmt::Debug for LoginPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPage")
            .field("email", &self.email)
            .field("password", &"***")
            .field("error", &self.error)
            .field("loading", &self.loading)
            .finish()
    }
}

impl LoginPage {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Link to the account creation form.
    pub fn open_register() -> Route {
        Route::Register
    }

    /// Signs in and returns the dashboard route on success.
    ///
    /// Failures are recorded in `error`.
    pub async fn submit(&mut self, client: &ApiClient) -> Option<Route> {
        self.error = None;
        self.loading = true;

        let credentials = LoginCredentials {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        };
        let result = client.auth().login(&credentials).await;
        self.loading = false;

        match result {
            Ok(response) => match establish_session(client.store(), response) {
                Ok(_) => Some(Route::Dashboard),
                Err(e) => {
                    self.error = Some(format!("{e:#}"));
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "login rejected");
                self.error = Some(e.user_message("Login failed"));
                None
            }
        }
    }
}

/// Account creation form.
#[derive(Clone, Default)]
pub struct RegisterPage {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub error: Option<String>,
    pub success: Option<String>,
    pub loading: bool,
}

impl fmt::Debug for RegisterPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterPage")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("password_confirm", &"***")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("error", &self.error)
            .field("success", &self.success)
            .field("loading", &self.loading)
            .finish()
    }
}

impl RegisterPage {
    /// Link back to the sign-in form.
    pub fn open_login() -> Route {
        Route::Login
    }

    fn data(&self) -> RegisterData {
        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        RegisterData {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: optional(&self.first_name),
            last_name: optional(&self.last_name),
        }
    }

    /// Registers the account, signs it in and returns the dashboard route.
    ///
    /// A password mismatch is reported without contacting the server.
    pub async fn submit(&mut self, client: &ApiClient) -> Option<Route> {
        self.error = None;
        self.success = None;

        if self.password != self.password_confirm {
            self.error = Some("Passwords do not match".to_string());
            return None;
        }

        self.loading = true;
        let result = client.auth().register(&self.data()).await;
        self.loading = false;

        match result {
            Ok(response) => match establish_session(client.store(), response) {
                Ok(user) => {
                    self.success = Some(format!(
                        "Account created successfully! Welcome, {}!",
                        user.username
                    ));
                    Some(Route::Dashboard)
                }
                Err(e) => {
                    self.error = Some(format!("{e:#}"));
                    None
                }
            },
            Err(e) => {
                self.error = Some(e.user_message("Registration failed"));
                None
            }
        }
    }
}
