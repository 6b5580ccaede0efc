//! API client for communicating with the banking backend.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests. Calls are single-shot: no retries, no caching.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionContext;
use crate::models::{
    AccountInfo, CardApplication, DashboardSnapshot, ForgotPasswordRequest, LanguageUpdate,
    LoginData, LoginRequest, MarkReadRequest, Notification, ProfileUpdate, RegisterRequest,
    ResetPasswordRequest, TransactionLimits, UserSettings,
};
use crate::navigation::{Navigator, Redirect, SessionNotice};

use super::{ApiError, ApiOutcome, Envelope};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Session lifetime assumed when the login response carries no expiry.
const FALLBACK_SESSION_HOURS: i64 = 24;

/// API client for the banking backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            navigator,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("Stored token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Global authorization-failure policy: drop the session, go to login.
    ///
    /// `sent_token` is the token the rejected request carried. When that
    /// session has already ended (a concurrent 401, logout, a newer login),
    /// nothing is cleared and no further redirect is issued.
    fn handle_unauthorized(&self, sent_token: Option<&str>) {
        if let Some(sent) = sent_token {
            if self.session.token().as_deref() != Some(sent) {
                debug!("Unauthorized response for a session that already ended");
                return;
            }
        }
        let had_token = self.session.clear();
        warn!(had_token, "Request not authorized, session cleared");
        self.navigator
            .navigate(Redirect::to_login(SessionNotice::Unauthorized));
    }

    async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let sent_token = self.session.token();
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .headers(Self::auth_headers(sent_token.as_deref())?);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, url = %url, "Sending request");
        let response = builder.send().await?;
        let data = self.check_response(response, sent_token.as_deref()).await?;

        serde_json::from_value(data).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse data from {}: {}", path, e))
        })
    }

    /// Decode the envelope, applying the unauthorized policy.
    async fn check_response(
        &self,
        response: reqwest::Response,
        sent_token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(sent_token);
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await?;
        match Envelope::parse(&body).map(Envelope::into_outcome) {
            Some(ApiOutcome::Success(data)) => Ok(data),
            Some(ApiOutcome::NotAuthorized(message)) => {
                debug!(message = %message, "Backend rejected credentials");
                self.handle_unauthorized(sent_token);
                Err(ApiError::Unauthorized)
            }
            Some(ApiOutcome::Failure(message)) => Err(ApiError::Business(
                message.unwrap_or_else(|| format!("Request failed with status {}", status)),
            )),
            None if status.is_success() => Err(ApiError::InvalidResponse(format!(
                "Expected a response envelope, got: {}",
                ApiError::truncate_body(&body)
            ))),
            None => Err(ApiError::from_status(status, &body)),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    // ===== Identity =====

    pub async fn register(&self, request: &RegisterRequest) -> Result<serde_json::Value, ApiError> {
        self.post("/auth/register", request).await
    }

    /// Authenticate and store the issued session (token and expiry, in local
    /// storage and cookies).
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginData, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let data: LoginData = self.post("/auth/login", &request).await?;

        if data.token.is_empty() {
            return Err(ApiError::InvalidResponse("Login response has an empty token".to_string()));
        }

        let expires_at = data.expiry().unwrap_or_else(|| {
            warn!(
                fallback_hours = FALLBACK_SESSION_HOURS,
                "Login response has no usable expiry, assuming default lifetime"
            );
            Utc::now() + chrono::Duration::hours(FALLBACK_SESSION_HOURS)
        });

        self.session
            .establish(&data.token, expires_at)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

        debug!(%expires_at, "Login successful");
        Ok(data)
    }

    /// End the session on the server and locally.
    ///
    /// The local session is cleared whatever the server answers; transport
    /// or server errors are still returned so the caller can report them.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result: Result<serde_json::Value, ApiError> =
            self.request(Method::POST, "/auth/logout", None::<&()>).await;

        match result {
            // Token was already rejected; the unauthorized handler redirected
            Err(ApiError::Unauthorized) => Ok(()),
            other => {
                self.session.clear();
                self.navigator
                    .navigate(Redirect::to_login(SessionNotice::LoggedOut));
                other.map(|_| ())
            }
        }
    }

    /// Request a reset code; remembers the email for the OTP step.
    pub async fn forgot_password(&self, email: &str) -> Result<serde_json::Value, ApiError> {
        let request = ForgotPasswordRequest {
            email: email.to_string(),
        };
        let data = self.post("/auth/forgot-password", &request).await?;
        if let Err(e) = self.session.set_reset_email(email) {
            warn!(error = %e, "Failed to remember reset email");
        }
        Ok(data)
    }

    /// Set a new password with a reset token; forgets the reset scratch state.
    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<serde_json::Value, ApiError> {
        let path = format!("/auth/reset-password/{}", urlencoding::encode(reset_token));
        let request = ResetPasswordRequest {
            password: password.to_string(),
        };
        let data = self.post(&path, &request).await?;
        if let Err(e) = self.session.clear_reset() {
            warn!(error = %e, "Failed to clear password reset state");
        }
        Ok(data)
    }

    pub async fn verify_email(&self, verification_token: &str) -> Result<serde_json::Value, ApiError> {
        let path = format!("/auth/verify/{}", urlencoding::encode(verification_token));
        self.get(&path).await
    }

    // ===== Settings =====

    pub async fn settings(&self) -> Result<UserSettings, ApiError> {
        self.get("/users/settings").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<serde_json::Value, ApiError> {
        self.put("/users/profile", update).await
    }

    pub async fn update_language(&self, language: &str) -> Result<serde_json::Value, ApiError> {
        let request = LanguageUpdate {
            language: language.to_string(),
        };
        self.put("/users/language", &request).await
    }

    pub async fn update_transaction_limits(&self, limits: &TransactionLimits) -> Result<serde_json::Value, ApiError> {
        self.put("/users/transaction-limits", limits).await
    }

    // ===== Account & dashboard =====

    pub async fn account_info(&self) -> Result<AccountInfo, ApiError> {
        self.get("/account/info").await
    }

    /// Fetch notifications; accepts a bare list or `{notifications: [...]}`
    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NotificationsData {
            List(Vec<Notification>),
            Wrapped {
                #[serde(default)]
                notifications: Vec<Notification>,
            },
            Empty,
        }

        let data: NotificationsData = self.get("/notifications").await?;
        let notifications = match data {
            NotificationsData::List(list) => list,
            NotificationsData::Wrapped { notifications } => notifications,
            NotificationsData::Empty => Vec::new(),
        };
        debug!("Fetched {} notifications", notifications.len());
        Ok(notifications)
    }

    /// Mark the given notifications read; an empty slice marks all
    pub async fn mark_notifications_read(&self, ids: &[String]) -> Result<serde_json::Value, ApiError> {
        let request = MarkReadRequest { ids: ids.to_vec() };
        self.post("/notifications/mark-read", &request).await
    }

    /// Account info and notifications, fetched concurrently
    pub async fn dashboard_snapshot(&self) -> Result<DashboardSnapshot, ApiError> {
        let (account, notifications) =
            futures::try_join!(self.account_info(), self.notifications())?;
        Ok(DashboardSnapshot {
            account,
            notifications,
        })
    }

    // ===== Cards =====

    pub async fn apply_card(&self, application: &CardApplication) -> Result<serde_json::Value, ApiError> {
        self.post("/cards/apply", application).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use chrono::Duration as ChronoDuration;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::{CardNetwork, CardType};
    use crate::navigation::{ChannelNavigator, Route};
    use crate::storage::{cookies, keys, KeyValueStore, MemoryStore};

    type Seen = Arc<Mutex<Vec<Option<String>>>>;

    struct Fixture {
        api: ApiClient,
        storage: Arc<MemoryStore>,
        cookie_jar: Arc<MemoryStore>,
        redirects: mpsc::UnboundedReceiver<Redirect>,
    }

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fixture(base_url: &str) -> Fixture {
        let storage = Arc::new(MemoryStore::new());
        let cookie_jar = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionContext::new(storage.clone(), cookie_jar.clone()));
        let (navigator, redirects) = ChannelNavigator::new();
        let api = ApiClient::new(base_url, session, Arc::new(navigator)).unwrap();
        Fixture {
            api,
            storage,
            cookie_jar,
            redirects,
        }
    }

    impl Fixture {
        fn sign_in(&self, token: &str) {
            self.api
                .session()
                .establish(token, Utc::now() + ChronoDuration::hours(1))
                .unwrap();
        }
    }

    fn authorization(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    fn ok(data: Value) -> Json<Value> {
        Json(json!({"success": true, "data": data}))
    }

    /// Backend that records the Authorization header of every request
    fn recording_backend(seen: Seen) -> Router {
        let on_get = seen.clone();
        let on_post = seen.clone();
        let on_put = seen;
        Router::new()
            .route(
                "/account/info",
                get(move |headers: HeaderMap| {
                    let seen = on_get.clone();
                    async move {
                        seen.lock().unwrap().push(authorization(&headers));
                        ok(json!({"accountNumber": "1234567890", "balance": 99.5}))
                    }
                }),
            )
            .route(
                "/cards/apply",
                post(move |headers: HeaderMap, Json(body): Json<Value>| {
                    let seen = on_post.clone();
                    async move {
                        seen.lock().unwrap().push(authorization(&headers));
                        ok(json!({"applicationId": "app-1", "echo": body}))
                    }
                }),
            )
            .route(
                "/users/language",
                put(move |headers: HeaderMap| {
                    let seen = on_put.clone();
                    async move {
                        seen.lock().unwrap().push(authorization(&headers));
                        ok(Value::Null)
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_bearer_token_attached_when_present() {
        let seen: Seen = Arc::default();
        let base = spawn_backend(recording_backend(seen.clone())).await;
        let fx = fixture(&base);
        fx.sign_in("tok-abc");

        let info = fx.api.account_info().await.unwrap();
        assert_eq!(info.balance, Some(99.5));

        let card = CardApplication {
            card_type: CardType::Debit,
            network: CardNetwork::Mastercard,
            name_on_card: None,
            delivery_address: None,
        };
        let applied = fx.api.apply_card(&card).await.unwrap();
        assert_eq!(applied["echo"]["cardType"], "debit");

        fx.api.update_language("fr").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|h| h.as_deref() == Some("Bearer tok-abc")));
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_token() {
        let seen: Seen = Arc::default();
        let base = spawn_backend(recording_backend(seen.clone())).await;
        let fx = fixture(&base);

        fx.api.account_info().await.unwrap();
        fx.api.update_language("en").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[None, None]);
    }

    #[tokio::test]
    async fn test_http_401_clears_session_and_redirects() {
        let router = Router::new().route(
            "/users/settings",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"success": false, "message": "jwt expired"})),
                )
            }),
        );
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("stale");

        let err = fx.api.settings().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(fx.storage.get(keys::TOKEN), None);
        assert_eq!(fx.storage.get(keys::EXPIRES_AT), None);
        assert_eq!(fx.cookie_jar.get(cookies::TOKEN), None);

        let redirect = fx.redirects.try_recv().unwrap();
        assert_eq!(redirect.route, Route::Login);
        assert_eq!(redirect.notice, Some(SessionNotice::Unauthorized));
    }

    #[tokio::test]
    async fn test_not_authorized_message_triggers_global_policy() {
        let router = Router::new().route(
            "/notifications/mark-read",
            post(|| async { Json(json!({"success": false, "message": "Not authorized, token failed"})) }),
        );
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("tok");

        let err = fx.api.mark_notifications_read(&[]).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(fx.api.session().token().is_none());
        assert_eq!(
            fx.redirects.try_recv().unwrap(),
            Redirect::to_login(SessionNotice::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_concurrent_401s_redirect_once() {
        let rejected = || async { StatusCode::UNAUTHORIZED };
        let router = Router::new()
            .route("/account/info", get(rejected))
            .route("/users/settings", get(rejected));
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("tok");

        let (account, settings) = tokio::join!(fx.api.account_info(), fx.api.settings());
        assert!(account.unwrap_err().is_unauthorized());
        assert!(settings.unwrap_err().is_unauthorized());

        assert!(fx.api.session().token().is_none());
        assert_eq!(
            fx.redirects.try_recv().unwrap(),
            Redirect::to_login(SessionNotice::Unauthorized)
        );
        assert!(fx.redirects.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_401_does_not_end_newer_session() {
        let router = Router::new().route(
            "/account/info",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                StatusCode::UNAUTHORIZED
            }),
        );
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("old");

        let api = fx.api.clone();
        let pending = tokio::spawn(async move { api.account_info().await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        fx.sign_in("new");

        assert!(pending.await.unwrap().unwrap_err().is_unauthorized());
        assert_eq!(fx.api.session().token().as_deref(), Some("new"));
        assert!(fx.redirects.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_transaction_limits_sends_limits() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let recorded = seen.clone();
        let router = Router::new().route(
            "/users/transaction-limits",
            put(move |Json(body): Json<Value>| {
                let recorded = recorded.clone();
                async move {
                    *recorded.lock().unwrap() = Some(body);
                    ok(json!({"updated": true}))
                }
            }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);
        fx.sign_in("tok");

        let limits = TransactionLimits {
            daily_transfer: Some(5000.0),
            daily_withdrawal: None,
            single_transaction: Some(1000.0),
        };
        let result = fx.api.update_transaction_limits(&limits).await.unwrap();
        assert_eq!(result["updated"], true);

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["dailyTransfer"], 5000.0);
        assert_eq!(body["singleTransaction"], 1000.0);
        assert!(body.get("dailyWithdrawal").is_none());
    }

    #[tokio::test]
    async fn test_business_failure_keeps_session() {
        let router = Router::new().route(
            "/cards/apply",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"success": false, "message": "Insufficient funds"})),
                )
            }),
        );
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("tok");

        let card = CardApplication {
            card_type: CardType::Credit,
            network: CardNetwork::Visa,
            name_on_card: None,
            delivery_address: None,
        };
        let err = fx.api.apply_card(&card).await.unwrap_err();

        assert_eq!(err.to_string(), "Insufficient funds");
        assert!(matches!(err, ApiError::Business(_)));
        assert_eq!(fx.api.session().token().as_deref(), Some("tok"));
        assert!(fx.redirects.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_without_message_mentions_status() {
        let router = Router::new().route(
            "/users/profile",
            put(|| async { (StatusCode::CONFLICT, Json(json!({"success": false}))) }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        let err = fx.api.update_profile(&ProfileUpdate::default()).await.unwrap_err();
        assert!(err.to_string().contains("409"));
    }

    #[tokio::test]
    async fn test_login_establishes_session_in_storage_and_cookies() {
        let router = Router::new().route(
            "/auth/login",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["email"], "ada@example.com");
                ok(json!({"token": "fresh", "expiresAt": "2099-01-01T00:00:00.000Z"}))
            }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        let data = fx.api.login("ada@example.com", "pw").await.unwrap();
        assert_eq!(data.token, "fresh");

        assert_eq!(fx.storage.get(keys::TOKEN).as_deref(), Some("fresh"));
        assert_eq!(
            fx.storage.get(keys::EXPIRES_AT).as_deref(),
            Some("2099-01-01T00:00:00.000Z")
        );
        assert_eq!(fx.cookie_jar.get(cookies::TOKEN).as_deref(), Some("fresh"));
        assert_eq!(
            fx.cookie_jar.get(cookies::EXPIRY).as_deref(),
            Some("2099-01-01T00:00:00.000Z")
        );
        assert!(fx.api.session().is_valid());
    }

    #[tokio::test]
    async fn test_login_without_expiry_assumes_default_lifetime() {
        let router = Router::new().route(
            "/auth/login",
            post(|| async { ok(json!({"token": "fresh"})) }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        fx.api.login("ada@example.com", "pw").await.unwrap();

        let expires_at = fx.api.session().expires_at().unwrap();
        let remaining = expires_at - Utc::now();
        assert!(remaining > ChronoDuration::hours(FALLBACK_SESSION_HOURS - 1));
        assert!(remaining <= ChronoDuration::hours(FALLBACK_SESSION_HOURS));
    }

    #[tokio::test]
    async fn test_logout_clears_session_even_when_server_fails() {
        let router = Router::new().route(
            "/auth/logout",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("tok");

        let err = fx.api.logout().await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError(_)));
        assert!(fx.storage.get(keys::TOKEN).is_none());
        assert!(fx.cookie_jar.is_empty());
        assert_eq!(
            fx.redirects.try_recv().unwrap(),
            Redirect::to_login(SessionNotice::LoggedOut)
        );
    }

    #[tokio::test]
    async fn test_logout_with_rejected_token_redirects_once() {
        let router = Router::new().route(
            "/auth/logout",
            post(|| async { StatusCode::UNAUTHORIZED }),
        );
        let base = spawn_backend(router).await;
        let mut fx = fixture(&base);
        fx.sign_in("tok");

        fx.api.logout().await.unwrap();
        assert!(fx.api.session().token().is_none());
        assert_eq!(
            fx.redirects.try_recv().unwrap().notice,
            Some(SessionNotice::Unauthorized)
        );
        assert!(fx.redirects.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_password_reset_flow_state() {
        let router = Router::new()
            .route(
                "/auth/forgot-password",
                post(|| async { Json(json!({"success": true, "message": "Code sent"})) }),
            )
            .route(
                "/auth/reset-password/{token}",
                post(|Path(token): Path<String>, Json(body): Json<Value>| async move {
                    ok(json!({"token": token, "password": body["password"]}))
                }),
            );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        fx.api.forgot_password("ada@example.com").await.unwrap();
        assert_eq!(
            fx.storage.get(keys::RESET_EMAIL).as_deref(),
            Some("ada@example.com")
        );
        fx.api.session().set_reset_token("a/b c").unwrap();

        let echoed = fx.api.reset_password("a/b c", "n3w").await.unwrap();
        // Path segment survived encoding intact
        assert_eq!(echoed["token"], "a/b c");
        assert_eq!(echoed["password"], "n3w");
        assert_eq!(fx.storage.get(keys::RESET_EMAIL), None);
        assert_eq!(fx.storage.get(keys::RESET_TOKEN), None);
    }

    #[tokio::test]
    async fn test_verify_email_and_register() {
        let router = Router::new()
            .route(
                "/auth/verify/{token}",
                get(|Path(token): Path<String>| async move { ok(json!({"verified": token})) }),
            )
            .route(
                "/auth/register",
                post(|Json(body): Json<Value>| async move { ok(json!({"email": body["email"]})) }),
            );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        let verified = fx.api.verify_email("v-1").await.unwrap();
        assert_eq!(verified["verified"], "v-1");

        let request = RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "pw".to_string(),
            ..Default::default()
        };
        let registered = fx.api.register(&request).await.unwrap();
        assert_eq!(registered["email"], "ada@example.com");
        // Registration does not sign in
        assert!(fx.api.session().token().is_none());
    }

    #[tokio::test]
    async fn test_notifications_accepts_both_shapes() {
        let list = Router::new().route(
            "/notifications",
            get(|| async { ok(json!([{"id": "1", "title": "Hi", "read": false}])) }),
        );
        let wrapped = Router::new().route(
            "/notifications",
            get(|| async { ok(json!({"notifications": [{"id": "1"}, {"id": "2"}]})) }),
        );
        let missing = Router::new().route(
            "/notifications",
            get(|| async { Json(json!({"success": true})) }),
        );

        let fx = fixture(&spawn_backend(list).await);
        assert_eq!(fx.api.notifications().await.unwrap().len(), 1);

        let fx = fixture(&spawn_backend(wrapped).await);
        assert_eq!(fx.api.notifications().await.unwrap().len(), 2);

        let fx = fixture(&spawn_backend(missing).await);
        assert!(fx.api.notifications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_snapshot_combines_both_calls() {
        let router = Router::new()
            .route(
                "/account/info",
                get(|| async { ok(json!({"balance": 10.0, "currency": "EUR"})) }),
            )
            .route(
                "/notifications",
                get(|| async { ok(json!([{"id": "1", "read": false}, {"id": "2", "read": true}])) }),
            );
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        let snapshot = fx.api.dashboard_snapshot().await.unwrap();
        assert_eq!(snapshot.account.currency_code(), "EUR");
        assert_eq!(snapshot.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_non_envelope_responses() {
        let router = Router::new()
            .route("/account/info", get(|| async { (StatusCode::NOT_FOUND, "no such route") }))
            .route("/users/settings", get(|| async { "plain text" }));
        let base = spawn_backend(router).await;
        let fx = fixture(&base);

        assert!(matches!(fx.api.account_info().await, Err(ApiError::NotFound(_))));
        assert!(matches!(fx.api.settings().await, Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session() {
        // Grab a free port, then close it so connections are refused
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut fx = fixture(&format!("http://{}", addr));
        fx.sign_in("tok");

        let err = fx.api.account_info().await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
        assert_eq!(fx.api.session().token().as_deref(), Some("tok"));
        assert!(fx.redirects.try_recv().is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let fx = fixture("http://localhost:5000/api/");
        assert_eq!(fx.api.base_url(), "http://localhost:5000/api");
        assert_eq!(fx.api.url("/auth/login"), "http://localhost:5000/api/auth/login");
    }
}
