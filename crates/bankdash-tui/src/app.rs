//! Application state management for bankdash.
//!
//! This module contains the core `App` struct that manages all application state,
//! including the login form, the mounted session monitor, dashboard data and
//! background task coordination.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use bankdash_core::auth::{CredentialStore, InteractionKind, MonitorSettings};
use bankdash_core::models::{DashboardSnapshot, UserSettings};
use bankdash_core::navigation::{DashboardPage, SettingsPage};
use bankdash_core::{
    ApiClient, ApiError, ChannelNavigator, Config, MonitorHandle, Redirect, Route,
    SessionContext, SessionMonitor,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Maximum length for email input.
/// 254 is the longest address SMTP accepts.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Environment variable that pre-fills the login email
pub const USERNAME_ENV: &str = "BANKDASH_USERNAME";

// ============================================================================
// UI State Types
// ============================================================================

/// Dashboard pages reachable from the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Notifications,
    Settings,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Notifications => "Notifications",
            Tab::Settings => "Settings",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Overview => Tab::Notifications,
            Tab::Notifications => Tab::Settings,
            Tab::Settings => Tab::Overview,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Tab::Overview => Tab::Settings,
            Tab::Notifications => Tab::Overview,
            Tab::Settings => Tab::Notifications,
        }
    }

    /// The dashboard route this tab renders
    pub fn route(&self) -> Route {
        Route::Dashboard(match self {
            Tab::Overview => DashboardPage::Overview,
            Tab::Notifications => DashboardPage::Notifications,
            Tab::Settings => DashboardPage::Settings(SettingsPage::Overview),
        })
    }

    /// Tab showing a dashboard route, if the terminal has one
    pub fn for_route(route: Route) -> Option<Self> {
        match route {
            Route::Dashboard(DashboardPage::Overview) => Some(Tab::Overview),
            Route::Dashboard(DashboardPage::Notifications) => Some(Tab::Notifications),
            Route::Dashboard(DashboardPage::Settings(_)) => Some(Tab::Settings),
            _ => None,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    LoggingIn,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Remember,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Remember,
            LoginFocus::Remember => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Email,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Remember => LoginFocus::Password,
            LoginFocus::Button => LoginFocus::Remember,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned API calls.
enum TaskResult {
    Snapshot(Result<DashboardSnapshot, ApiError>),
    Settings(Result<UserSettings, ApiError>),
    NotificationsMarked(Result<(), ApiError>),
    LoggedOut(Result<(), ApiError>),
}

/// A task result tagged with the session generation that spawned it
struct TaskMessage {
    generation: u64,
    result: TaskResult,
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub session: Arc<SessionContext>,
    pub api: ApiClient,
    navigator: Arc<ChannelNavigator>,
    redirects: mpsc::UnboundedReceiver<Redirect>,
    monitor: Option<MonitorHandle>,
    /// Bumped whenever a session starts or ends
    session_generation: u64,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub notification_selection: usize,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub remember_credentials: bool,

    // Dashboard data
    pub snapshot: Option<DashboardSnapshot>,
    pub settings: Option<UserSettings>,
    pub loading: bool,

    // Background task channel
    task_rx: mpsc::Receiver<TaskMessage>,
    task_tx: mpsc::Sender<TaskMessage>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance backed by the stores in the cache
    /// directory.
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        std::fs::create_dir_all(&cache_dir)?;
        let session = SessionContext::open(&cache_dir)?;
        debug!(?cache_dir, ?session, "Session stores opened");
        Self::with_session(config, Arc::new(session))
    }

    pub fn with_session(config: Config, session: Arc<SessionContext>) -> Result<Self> {
        let (navigator, redirects) = ChannelNavigator::new();
        let navigator = Arc::new(navigator);

        let base_url = std::env::var("BANKDASH_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config.api_base_url());
        debug!(base_url = %base_url, "API base URL configured");

        let api = ApiClient::new(base_url, session.clone(), navigator.clone())?;

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_email = std::env::var(USERNAME_ENV)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let remember_credentials = config.remember_credentials;

        Ok(Self {
            config,
            session,
            api,
            navigator,
            redirects,
            monitor: None,
            session_generation: 0,

            state: AppState::Normal,
            current_tab: Tab::Overview,
            notification_selection: 0,

            login_email,
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            login_error: None,
            remember_credentials,

            snapshot: None,
            settings: None,
            loading: false,

            task_rx: rx,
            task_tx: tx,

            status_message: None,
        })
    }

    /// Decide the first screen: the dashboard when a session token exists,
    /// the login form otherwise.
    ///
    /// A stored but already expired session still mounts the monitor, which
    /// clears it on its first check and redirects with the expired notice.
    pub fn startup(&mut self) {
        if !self.session.has_token() {
            self.start_login();
            return;
        }

        self.state = AppState::Normal;
        self.mount_monitor();
        if self.session.is_valid() {
            self.refresh_background();
        }
    }

    // =========================================================================
    // Session supervision
    // =========================================================================

    fn mount_monitor(&mut self) {
        self.session_generation += 1;
        // Replacing the handle unmounts the previous monitor
        self.monitor = SessionMonitor::new(self.session.clone(), self.navigator.clone())
            .with_settings(MonitorSettings::from_config(&self.config))
            .mount();
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| m.is_active())
    }

    /// Report a qualifying user interaction to the mounted monitor
    pub fn record_interaction(&self, kind: InteractionKind) {
        if let Some(ref monitor) = self.monitor {
            monitor.record(kind);
        }
    }

    /// Follow redirects issued by the monitor and the API client
    pub fn check_redirects(&mut self) {
        while let Ok(redirect) = self.redirects.try_recv() {
            self.apply_redirect(redirect);
        }
    }

    fn apply_redirect(&mut self, redirect: Redirect) {
        debug!(route = %redirect.route, notice = ?redirect.notice, "Following redirect");

        if redirect.route == Route::Login {
            if let Some(monitor) = self.monitor.take() {
                monitor.stop();
            }
            self.session_generation += 1;
            self.snapshot = None;
            self.settings = None;
            self.loading = false;
            self.status_message = None;
            self.start_login();
            self.login_error = redirect.notice.map(|n| n.message().to_string());
            return;
        }

        match Tab::for_route(redirect.route) {
            Some(tab) => self.current_tab = tab,
            None => warn!(route = %redirect.route, "No terminal view for route"),
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow::anyhow!("Email and password required"));
        }

        self.login_error = None;

        match self.api.login(&email, &password).await {
            Ok(_) => {
                // The unauthorized handler may have queued a redirect from a
                // previous attempt; it no longer applies.
                while self.redirects.try_recv().is_ok() {}

                self.remember(&email, &password);

                self.config.last_username = Some(email);
                self.config.remember_credentials = self.remember_credentials;
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.state = AppState::Normal;
                self.current_tab = Tab::Overview;
                self.mount_monitor();
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                // Rejected credentials redirect back here; keep the form as is
                while self.redirects.try_recv().is_ok() {}
                self.login_error = Some(if e.is_unauthorized() {
                    "Invalid email or password".to_string()
                } else {
                    e.user_message()
                });
                Err(e.into())
            }
        }
    }

    fn remember(&self, email: &str, password: &str) {
        let result = if self.remember_credentials {
            CredentialStore::store(email, password)
        } else {
            CredentialStore::delete(email)
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to update stored credentials");
        }
    }

    /// Fill the password from the keychain if one is stored for the email
    pub fn fill_stored_password(&mut self) -> bool {
        if !self.login_password.is_empty() || !CredentialStore::has_credentials(&self.login_email) {
            return false;
        }
        match CredentialStore::get_password(&self.login_email) {
            Ok(password) => {
                self.login_password = password;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored password");
                false
            }
        }
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Log out in the background; the API client redirects when done
    pub fn logout_background(&mut self) {
        let api = self.api.clone();
        self.status_message = Some("Logging out...".to_string());
        self.spawn_task(async move { TaskResult::LoggedOut(api.logout().await) });
    }

    // =========================================================================
    // Background refresh
    // =========================================================================

    /// Fetch the dashboard snapshot and settings in the background
    pub fn refresh_background(&mut self) {
        self.loading = true;
        self.status_message = Some("Loading...".to_string());

        let api = self.api.clone();
        self.spawn_task(async move { TaskResult::Snapshot(api.dashboard_snapshot().await) });

        let api = self.api.clone();
        self.spawn_task(async move { TaskResult::Settings(api.settings().await) });
    }

    /// Mark every notification read, then refresh
    pub fn mark_all_read_background(&mut self) {
        let api = self.api.clone();
        self.spawn_task(async move {
            TaskResult::NotificationsMarked(api.mark_notifications_read(&[]).await.map(|_| ()))
        });
    }

    /// Run an API call in the background, tagging its result with the
    /// current session generation.
    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        let generation = self.session_generation;
        tokio::spawn(async move {
            let result = task.await;
            if tx.send(TaskMessage { generation, result }).await.is_err() {
                debug!("Task result dropped, app closed");
            }
        });
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, message: TaskMessage) {
        // Results from a session that has since ended are stale
        if message.generation != self.session_generation || self.state == AppState::LoggingIn {
            debug!(
                generation = message.generation,
                current = self.session_generation,
                "Discarding stale task result"
            );
            return;
        }

        match message.result {
            TaskResult::Snapshot(Ok(snapshot)) => {
                self.loading = false;
                self.notification_selection = self
                    .notification_selection
                    .min(snapshot.notifications.len().saturating_sub(1));
                self.status_message = None;
                self.snapshot = Some(snapshot);
            }
            TaskResult::Settings(Ok(settings)) => {
                self.settings = Some(settings);
            }
            TaskResult::NotificationsMarked(Ok(())) => {
                self.status_message = Some("All notifications marked read".to_string());
                self.refresh_background();
            }
            TaskResult::LoggedOut(Ok(())) => {
                info!("Logged out");
            }
            TaskResult::Snapshot(Err(e))
            | TaskResult::Settings(Err(e))
            | TaskResult::NotificationsMarked(Err(e))
            | TaskResult::LoggedOut(Err(e)) => {
                self.loading = false;
                if e.is_unauthorized() {
                    // The redirect carries the notice
                    return;
                }
                warn!(error = %e, "Background task failed");
                self.status_message = Some(e.user_message());
            }
        }
    }

    /// Minutes left before the absolute expiry, for the status bar
    pub fn session_minutes_left(&self) -> Option<i64> {
        self.session.data().map(|d| d.minutes_until_expiry())
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bankdash_core::auth::SessionState;
    use bankdash_core::SessionNotice;
    use chrono::{Duration, Utc};

    /// Nothing listens on the discard port, so stray requests fail fast
    fn offline_config() -> Config {
        Config {
            api_base_url: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        }
    }

    fn app_with_session(session: SessionContext) -> App {
        App::with_session(offline_config(), Arc::new(session)).unwrap()
    }

    // -------------------------------------------------------------------------
    // Tab Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tab_cycle() {
        assert_eq!(Tab::Overview.next(), Tab::Notifications);
        assert_eq!(Tab::Settings.next(), Tab::Overview); // Wraps around
        assert_eq!(Tab::Overview.prev(), Tab::Settings);
    }

    #[test]
    fn test_tab_routes() {
        assert_eq!(Tab::Notifications.route().path(), "/dashboard/notifications");
        assert_eq!(Tab::Settings.route().path(), "/dashboard/settings");
        for tab in [Tab::Overview, Tab::Notifications, Tab::Settings] {
            assert_eq!(Tab::for_route(tab.route()), Some(tab));
        }
        assert_eq!(Tab::for_route(Route::Login), None);
    }

    #[test]
    fn test_login_focus_cycle() {
        let mut focus = LoginFocus::Email;
        for _ in 0..4 {
            focus = focus.next();
        }
        assert_eq!(focus, LoginFocus::Email);
        assert_eq!(LoginFocus::Email.prev(), LoginFocus::Button);
    }

    // -------------------------------------------------------------------------
    // Session Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_startup_without_session_shows_login() {
        let mut app = app_with_session(SessionContext::in_memory());
        app.startup();

        assert_eq!(app.state, AppState::LoggingIn);
        assert!(!app.is_monitoring());
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_startup_with_session_mounts_monitor() {
        let session = SessionContext::in_memory();
        session.establish("tok", Utc::now() + Duration::hours(1)).unwrap();
        let mut app = app_with_session(session);

        app.startup();

        assert_eq!(app.state, AppState::Normal);
        assert!(app.is_monitoring());
        assert!(app.loading);
        assert!(app.session_minutes_left().unwrap() >= 59);
    }

    #[tokio::test]
    async fn test_expired_session_at_startup_redirects_to_login() {
        let session = SessionContext::in_memory();
        session.establish("tok", Utc::now() - Duration::seconds(1)).unwrap();
        let mut app = app_with_session(session);

        app.startup();
        let state = app.monitor.as_mut().unwrap().wait_expired().await;
        assert!(matches!(state, SessionState::Expired(_)));

        app.check_redirects();
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.monitor.is_none());
        assert!(!app.session.has_token());
        assert_eq!(
            app.login_error.as_deref(),
            Some(SessionNotice::Expired.message())
        );
    }

    #[tokio::test]
    async fn test_login_redirect_drops_dashboard_state() {
        let session = SessionContext::in_memory();
        session.establish("tok", Utc::now() + Duration::hours(1)).unwrap();
        let mut app = app_with_session(session);
        app.startup();
        app.snapshot = Some(DashboardSnapshot::default());

        app.apply_redirect(Redirect::to_login(SessionNotice::Inactivity));

        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.snapshot.is_none());
        assert!(!app.is_monitoring());
        assert_eq!(app.login_focus, LoginFocus::Email);
        assert_eq!(
            app.login_error.as_deref(),
            Some("You were logged out due to inactivity.")
        );
    }

    #[tokio::test]
    async fn test_dashboard_redirect_switches_tab() {
        let mut app = app_with_session(SessionContext::in_memory());
        app.apply_redirect(Redirect::to(Tab::Settings.route()));
        assert_eq!(app.current_tab, Tab::Settings);
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected_before_request() {
        let mut app = app_with_session(SessionContext::in_memory());
        app.login_email = "   ".to_string();

        assert!(app.attempt_login().await.is_err());
        assert_eq!(app.login_error.as_deref(), Some("Email and password required"));
    }

    fn current(app: &App, result: TaskResult) -> TaskMessage {
        TaskMessage {
            generation: app.session_generation,
            result,
        }
    }

    #[tokio::test]
    async fn test_results_ignored_while_logged_out() {
        let mut app = app_with_session(SessionContext::in_memory());
        app.start_login();
        let message = current(&app, TaskResult::Snapshot(Ok(DashboardSnapshot::default())));
        app.process_task_result(message);
        assert!(app.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_results_from_previous_session_ignored_after_relogin() {
        let session = SessionContext::in_memory();
        session.establish("first", Utc::now() + Duration::hours(1)).unwrap();
        let mut app = app_with_session(session);
        app.startup();
        let stale = current(&app, TaskResult::Snapshot(Ok(DashboardSnapshot::default())));

        // Inactivity ends the first session, then the user signs in again
        app.apply_redirect(Redirect::to_login(SessionNotice::Inactivity));
        app.session
            .establish("second", Utc::now() + Duration::hours(1))
            .unwrap();
        app.state = AppState::Normal;
        app.mount_monitor();

        app.process_task_result(stale);
        assert!(app.snapshot.is_none());

        let fresh = current(&app, TaskResult::Snapshot(Ok(DashboardSnapshot::default())));
        app.process_task_result(fresh);
        assert!(app.snapshot.is_some());
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_business_error_becomes_status_message() {
        let mut app = app_with_session(SessionContext::in_memory());
        let message = current(
            &app,
            TaskResult::NotificationsMarked(Err(ApiError::Business("Nothing to mark".to_string()))),
        );
        app.process_task_result(message);
        assert_eq!(app.status_message.as_deref(), Some("Nothing to mark"));
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(0, '@'));
        assert!(can_add_email_char(253, 'z'));
        // Exceeds max length
        assert!(!can_add_email_char(254, 'a'));
        // Control characters and spaces rejected
        assert!(!can_add_email_char(0, '\x00'));
        assert!(!can_add_email_char(0, '\n'));
        assert!(!can_add_email_char(0, ' '));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(0, ' '));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }
}
