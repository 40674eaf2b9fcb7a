//! Authenticated request pipeline.
//!
//! Every request carries the stored access token as a bearer credential.
//! A 401 on anything but the token-management endpoints triggers one
//! refresh with the stored refresh token followed by one retry of the
//! original request. When the refresh cannot happen, the session is
//! cleared and the login redirect fires; the original error is returned.

mod error;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{ApiError, ApiErrorKind, ApiResult};

use crate::config::{Config, normalize_base_url};
use crate::models::AuthTokens;
use crate::session::TokenStore;

/// Standard User-Agent header for taskdesk API requests.
pub const USER_AGENT: &str = concat!("taskdesk/", env!("CARGO_PKG_VERSION"));

pub const LOGIN_PATH: &str = "auth/login/";
pub const REGISTER_PATH: &str = "auth/register/";
pub const REFRESH_PATH: &str = "auth/token/refresh/";

/// Endpoints whose 401 is final: they issue tokens rather than consume them.
const TOKEN_ENDPOINTS: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

/// Hook invoked when the session ends because it could not be refreshed.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Redirect hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRedirect;

impl LoginRedirect for NoRedirect {
    fn redirect_to_login(&self) {}
}

/// Immutable description of one API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL (e.g. `tasks/5/`).
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    /// Returns a parse error if the body cannot be serialized.
    pub fn json(mut self, body: &impl Serialize) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::parse(format!("Failed to serialize request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// True for login, register and token refresh.
    pub fn is_token_endpoint(&self) -> bool {
        let path = self.path.trim_start_matches('/');
        TOKEN_ENDPOINTS.iter().any(|endpoint| path.starts_with(endpoint))
    }
}

/// One dispatch of a request. A retry is a new `Attempt`, never a mutation.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    request: &'a ApiRequest,
    retried: bool,
}

impl<'a> Attempt<'a> {
    pub fn first(request: &'a ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    #[must_use]
    pub fn retry(self) -> Self {
        Self {
            request: self.request,
            retried: true,
        }
    }

    pub fn request(&self) -> &'a ApiRequest {
        self.request
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }
}

/// Decides whether a response should start the refresh-and-retry cycle.
pub fn needs_refresh(attempt: Attempt<'_>, status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
        && !attempt.is_retry()
        && !attempt.request().is_token_endpoint()
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

/// API client bound to a base URL and a token store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: TokenStore,
    redirect: Arc<dyn LoginRedirect>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client with no request timeout and no redirect hook.
    pub fn new(base_url: impl Into<String>, store: TokenStore) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            store,
            redirect: Arc::new(NoRedirect),
        }
    }

    /// Creates a client from resolved configuration.
    ///
    /// `api_url` takes precedence over the environment and the config file.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(
        config: &Config,
        api_url: Option<&str>,
        store: TokenStore,
    ) -> anyhow::Result<Self> {
        let base_url = match api_url {
            Some(url) => normalize_base_url(url)?,
            None => config.resolve_base_url()?,
        };
        Self::new(base_url, store).with_timeout(config.request_timeout())
    }

    /// Rebuilds the HTTP client with a per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        self.http = builder.build().context("Failed to build HTTP client")?;
        Ok(self)
    }

    #[must_use]
    pub fn with_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends one attempt with the access token current at dispatch time.
    async fn dispatch(&self, attempt: Attempt<'_>) -> ApiResult<reqwest::Response> {
        let request = attempt.request();
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .header("user-agent", USER_AGENT);

        match self.store.access_token() {
            Ok(access) => {
                if let Some(token) = access.filter(|t| !t.is_empty()) {
                    builder = builder.bearer_auth(token);
                }
            }
            // Token endpoints issue credentials and must work on an unreadable store.
            Err(e) if request.is_token_endpoint() => {
                tracing::warn!(
                    error = %format!("{e:#}"),
                    "session unreadable, sending without token"
                );
            }
            Err(e) => return Err(ApiError::storage(&e)),
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            retried = attempt.is_retry(),
            "dispatching request"
        );

        builder.send().await.map_err(|e| ApiError::from_transport(&e))
    }

    async fn check(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response).await)
        }
    }

    /// Runs a request through the pipeline and returns the successful response.
    ///
    /// # Errors
    /// Returns the original failure for anything but a recoverable 401; after
    /// a refresh the retried result is returned as-is.
    pub async fn send(&self, request: &ApiRequest) -> ApiResult<reqwest::Response> {
        let attempt = Attempt::first(request);
        let response = self.dispatch(attempt).await?;

        if !needs_refresh(attempt, response.status()) {
            return Self::check(response).await;
        }

        let original = ApiError::from_response(response).await;
        tracing::info!(path = %request.path, "access token rejected, refreshing");

        if let Err(refresh_error) = self.refresh_access_token().await {
            tracing::warn!(error = %refresh_error, "token refresh failed, ending session");
            self.end_session();
            return Err(original.with_details(format!("refresh failed: {refresh_error}")));
        }

        let response = self.dispatch(attempt.retry()).await?;
        Self::check(response).await
    }

    /// Sends a request and decodes the JSON body.
    ///
    /// # Errors
    /// Returns pipeline errors, or a parse error for an unexpected body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::parse(format!("Failed to parse response from {}: {e}", request.path))
        })
    }

    /// Sends a request whose response body is ignored.
    ///
    /// # Errors
    /// Returns pipeline errors.
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult<()> {
        self.send(request).await.map(|_| ())
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// The refresh call never carries a bearer header.
    async fn refresh_access_token(&self) -> ApiResult<()> {
        let refresh = self
            .store
            .refresh_token()
            .map_err(|e| ApiError::storage(&e))?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::unauthorized("No refresh token available"))?;

        let response = self
            .http
            .post(self.url(REFRESH_PATH))
            .header("user-agent", USER_AGENT)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        let response = Self::check(response).await?;

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::parse(format!("Failed to parse refresh response: {e}")))?;

        let stored = match body.refresh {
            Some(rotated) => self.store.set_tokens(&AuthTokens {
                access: body.access,
                refresh: rotated,
            }),
            None => self.store.set_access_token(&body.access),
        };
        stored.map_err(|e| ApiError::storage(&e))?;

        tracing::info!("access token refreshed");
        Ok(())
    }

    /// Clears the store and fires the login redirect.
    fn end_session(&self) {
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %format!("{e:#}"), "failed to clear session");
        }
        self.redirect.redirect_to_login();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::User;
    use crate::session::FileStore;

    #[derive(Default)]
    struct CountingRedirect(AtomicUsize);

    impl LoginRedirect for CountingRedirect {
        fn redirect_to_login(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CountingRedirect {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn signed_in_store(access: &str, refresh: &str) -> TokenStore {
        let store = TokenStore::in_memory();
        store
            .set_tokens(&AuthTokens {
                access: access.to_string(),
                refresh: refresh.to_string(),
            })
            .unwrap();
        store
            .set_user(&User {
                id: 1,
                username: "a".into(),
                email: "a@b.com".into(),
                first_name: None,
                last_name: None,
            })
            .unwrap();
        store
    }

    fn client_for(server: &MockServer, store: TokenStore) -> (ApiClient, Arc<CountingRedirect>) {
        let redirect = Arc::new(CountingRedirect::default());
        let client = ApiClient::new(server.uri(), store)
            .with_redirect(Arc::clone(&redirect) as Arc<dyn LoginRedirect>);
        (client, redirect)
    }

    async fn mount_refresh(server: &MockServer, status: u16, body: Value, times: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(times)
            .mount(server)
            .await;
    }

    #[test]
    fn test_token_endpoints_are_recognized() {
        assert!(ApiRequest::post("auth/login/").is_token_endpoint());
        assert!(ApiRequest::post("/auth/register/").is_token_endpoint());
        assert!(ApiRequest::post("auth/token/refresh/").is_token_endpoint());
        assert!(!ApiRequest::post("auth/logout/").is_token_endpoint());
        assert!(!ApiRequest::get("auth/user/").is_token_endpoint());
        assert!(!ApiRequest::get("tasks/").is_token_endpoint());
    }

    #[test]
    fn test_needs_refresh_decision() {
        let tasks = ApiRequest::get("tasks/");
        let login = ApiRequest::post("auth/login/");

        assert!(needs_refresh(Attempt::first(&tasks), StatusCode::UNAUTHORIZED));
        assert!(!needs_refresh(Attempt::first(&tasks).retry(), StatusCode::UNAUTHORIZED));
        assert!(!needs_refresh(Attempt::first(&login), StatusCode::UNAUTHORIZED));
        assert!(!needs_refresh(Attempt::first(&tasks), StatusCode::FORBIDDEN));
        assert!(!needs_refresh(Attempt::first(&tasks), StatusCode::OK));
    }

    #[test]
    fn test_retry_does_not_touch_original_attempt() {
        let request = ApiRequest::get("tasks/");
        let first = Attempt::first(&request);
        let retry = first.retry();
        assert!(!first.is_retry());
        assert!(retry.is_retry());
        assert_eq!(retry.request(), &request);
    }

    #[tokio::test]
    async fn test_valid_token_is_attached_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, json!({"access": "unused"}), 0).await;

        let (client, redirect) = client_for(&server, signed_in_store("T1", "R1"));
        let tasks: Vec<Value> = client.fetch(&ApiRequest::get("tasks/")).await.unwrap();

        assert!(tasks.is_empty());
        assert_eq!(redirect.count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_request_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .and(header("authorization", "Bearer OLD"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .and(header("authorization", "Bearer NEW"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .and(body_json(json!({"refresh": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "NEW"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = signed_in_store("OLD", "R1");
        let mut events = store.subscribe();
        let (client, redirect) = client_for(&server, store.clone());

        let tasks: Vec<Value> = client.fetch(&ApiRequest::get("tasks/")).await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(store.access_token().unwrap().as_deref(), Some("NEW"));
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("R1"));
        assert_eq!(
            events.try_recv().unwrap(),
            crate::session::SessionEvent::TokensChanged
        );
        assert_eq!(redirect.count(), 0);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user/"))
            .and(header("authorization", "Bearer OLD"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/user/"))
            .and(header("authorization", "Bearer NEW"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "username": "a"})),
            )
            .mount(&server)
            .await;
        mount_refresh(&server, 200, json!({"access": "NEW", "refresh": "R2"}), 1).await;

        let store = signed_in_store("OLD", "R1");
        let (client, _) = client_for(&server, store.clone());
        client.execute(&ApiRequest::get("auth/user/")).await.unwrap();

        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session_and_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 401, json!({"detail": "Token is blacklisted"}), 1).await;

        let store = signed_in_store("OLD", "R1");
        let (client, redirect) = client_for(&server, store.clone());

        let err = client.execute(&ApiRequest::get("tasks/")).await.unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
        assert_eq!(err.server_message.as_deref(), Some("expired"));
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(store.user().unwrap(), None);
        assert_eq!(redirect.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_skips_refresh_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, json!({"access": "NEW"}), 0).await;

        let store = TokenStore::in_memory();
        store.set_access_token("OLD").unwrap();
        let (client, redirect) = client_for(&server, store.clone());

        let err = client.execute(&ApiRequest::get("tasks/")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(redirect.count(), 1);
    }

    #[tokio::test]
    async fn test_retried_request_never_refreshes_twice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, json!({"access": "NEW"}), 1).await;

        let store = signed_in_store("OLD", "R1");
        let (client, redirect) = client_for(&server, store.clone());

        let err = client.execute(&ApiRequest::get("tasks/")).await.unwrap_err();

        assert!(err.is_unauthorized());
        // The retried failure is returned as-is: no teardown.
        assert_eq!(store.access_token().unwrap().as_deref(), Some("NEW"));
        assert_eq!(redirect.count(), 0);
    }

    #[tokio::test]
    async fn test_login_rejection_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, json!({"access": "NEW"}), 0).await;

        let store = signed_in_store("T1", "R1");
        let (client, redirect) = client_for(&server, store.clone());

        let request = ApiRequest::post(LOGIN_PATH)
            .json(&json!({"email": "a@b.com", "password": "wrong"}))
            .unwrap();
        let err = client.execute(&request).await.unwrap_err();

        assert_eq!(err.user_message("Login failed"), "Invalid credentials");
        assert!(store.has_session().unwrap());
        assert_eq!(redirect.count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_propagates_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, json!({"access": "NEW"}), 0).await;

        let (client, _) = client_for(&server, signed_in_store("T1", "R1"));
        let err = client.execute(&ApiRequest::get("tasks/")).await.unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::Http);
        assert_eq!(err.status, Some(500));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = ApiClient::new("http://127.0.0.1:9", TokenStore::in_memory());
        let err = client.execute(&ApiRequest::get("tasks/")).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Network);
    }

    #[tokio::test]
    async fn test_unexpected_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, signed_in_store("T1", "R1"));
        let err = client
            .fetch::<User>(&ApiRequest::get("auth/user/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_unreadable_session_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let session_path = dir.path().join("session.json");
        fs::write(&session_path, "{ not json").unwrap();
        let store = TokenStore::new(FileStore::new(&session_path));
        let (client, redirect) = client_for(&server, store);

        let err = client.execute(&ApiRequest::get("tasks/")).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Storage);
        assert!(err.user_message("Failed to load tasks").contains("session.json"));
        assert_eq!(redirect.count(), 0);
    }

    #[test]
    fn test_from_config_prefers_explicit_url() {
        let client = ApiClient::from_config(
            &Config::default(),
            Some(" http://example.com/api/ "),
            TokenStore::in_memory(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://example.com/api");

        let err = ApiClient::from_config(
            &Config::default(),
            Some("ftp://example.com"),
            TokenStore::in_memory(),
        );
        assert!(err.is_err());
    }
}
