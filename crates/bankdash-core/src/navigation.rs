//! Page routes and redirect delivery.
//!
//! The session monitor and the API client never render anything; when a
//! session ends they hand a `Redirect` to a `Navigator`, and the front end
//! decides how to show the login screen and the attached notice.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Pages under `/dashboard` (and `/admin/dashboard`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardPage {
    Overview,
    Transfer,
    Deposit,
    Withdraw,
    Loan,
    Kyc,
    Cards,
    Transactions,
    Notifications,
    Settings(SettingsPage),
}

/// Pages under `/dashboard/settings`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsPage {
    Overview,
    Profile,
    Language,
    TransactionLimits,
    Security,
}

impl SettingsPage {
    fn segment(&self) -> Option<&'static str> {
        match self {
            SettingsPage::Overview => None,
            SettingsPage::Profile => Some("profile"),
            SettingsPage::Language => Some("language"),
            SettingsPage::TransactionLimits => Some("transaction-limits"),
            SettingsPage::Security => Some("security"),
        }
    }

    fn from_segment(segment: Option<&str>) -> Option<Self> {
        Some(match segment {
            None => SettingsPage::Overview,
            Some("profile") => SettingsPage::Profile,
            Some("language") => SettingsPage::Language,
            Some("transaction-limits") => SettingsPage::TransactionLimits,
            Some("security") => SettingsPage::Security,
            Some(_) => return None,
        })
    }
}

impl DashboardPage {
    fn suffix(&self) -> String {
        let segment = match self {
            DashboardPage::Overview => return String::new(),
            DashboardPage::Transfer => "transfer",
            DashboardPage::Deposit => "deposit",
            DashboardPage::Withdraw => "withdraw",
            DashboardPage::Loan => "loan",
            DashboardPage::Kyc => "kyc",
            DashboardPage::Cards => "cards",
            DashboardPage::Transactions => "transactions",
            DashboardPage::Notifications => "notifications",
            DashboardPage::Settings(page) => {
                return match page.segment() {
                    Some(sub) => format!("/settings/{}", sub),
                    None => "/settings".to_string(),
                };
            }
        };
        format!("/{}", segment)
    }

    fn from_segments(segments: &[&str]) -> Option<Self> {
        match segments {
            [] => Some(DashboardPage::Overview),
            ["transfer"] => Some(DashboardPage::Transfer),
            ["deposit"] => Some(DashboardPage::Deposit),
            ["withdraw"] => Some(DashboardPage::Withdraw),
            ["loan"] => Some(DashboardPage::Loan),
            ["kyc"] => Some(DashboardPage::Kyc),
            ["cards"] => Some(DashboardPage::Cards),
            ["transactions"] => Some(DashboardPage::Transactions),
            ["notifications"] => Some(DashboardPage::Notifications),
            ["settings"] => SettingsPage::from_segment(None).map(DashboardPage::Settings),
            ["settings", sub] => SettingsPage::from_segment(Some(sub)).map(DashboardPage::Settings),
            _ => None,
        }
    }
}

/// Every page the front end exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    About,
    Services,
    Contact,
    Login,
    Register,
    ForgotPassword,
    VerifyOtp,
    VerifyResetOtp,
    ResetPassword,
    ChangePassword,
    Dashboard(DashboardPage),
    AdminDashboard(DashboardPage),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::About => "/about".to_string(),
            Route::Services => "/services".to_string(),
            Route::Contact => "/contact".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::ForgotPassword => "/forgot-password".to_string(),
            Route::VerifyOtp => "/verify-otp".to_string(),
            Route::VerifyResetOtp => "/verify-reset-otp".to_string(),
            Route::ResetPassword => "/reset-password".to_string(),
            Route::ChangePassword => "/change-password".to_string(),
            Route::Dashboard(page) => format!("/dashboard{}", page.suffix()),
            Route::AdminDashboard(page) => format!("/admin/dashboard{}", page.suffix()),
        }
    }

    /// Parse a URL path. Query strings, fragments and trailing slashes are
    /// ignored.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Some(Route::Home),
            ["about"] => Some(Route::About),
            ["services"] => Some(Route::Services),
            ["contact"] => Some(Route::Contact),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["forgot-password"] => Some(Route::ForgotPassword),
            ["verify-otp"] => Some(Route::VerifyOtp),
            ["verify-reset-otp"] => Some(Route::VerifyResetOtp),
            ["reset-password"] => Some(Route::ResetPassword),
            ["change-password"] => Some(Route::ChangePassword),
            ["dashboard", rest @ ..] => DashboardPage::from_segments(rest).map(Route::Dashboard),
            ["admin", "dashboard", rest @ ..] => {
                DashboardPage::from_segments(rest).map(Route::AdminDashboard)
            }
            _ => None,
        }
    }

    /// Pages that are only reachable with a valid session
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Route::Dashboard(_) | Route::AdminDashboard(_) | Route::ChangePassword
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Why the user was sent back to the login page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionNotice {
    /// The absolute expiry timestamp passed
    Expired,
    /// No interaction within the inactivity budget
    Inactivity,
    /// The backend rejected the token
    Unauthorized,
    LoggedOut,
}

impl SessionNotice {
    pub fn message(&self) -> &'static str {
        match self {
            SessionNotice::Expired => "Your session has expired. Please log in again.",
            SessionNotice::Inactivity => "You were logged out due to inactivity.",
            SessionNotice::Unauthorized => "Your session is no longer valid. Please log in again.",
            SessionNotice::LoggedOut => "You have been logged out.",
        }
    }
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub route: Route,
    pub notice: Option<SessionNotice>,
}

impl Redirect {
    pub fn to(route: Route) -> Self {
        Self { route, notice: None }
    }

    pub fn to_login(notice: SessionNotice) -> Self {
        Self {
            route: Route::Login,
            notice: Some(notice),
        }
    }
}

/// Receives redirects issued by the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, redirect: Redirect);
}

/// Forwards redirects to the front end's event loop.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Redirect>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Redirect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, redirect: Redirect) {
        debug!(route = %redirect.route, notice = ?redirect.notice, "Redirect issued");
        if self.tx.send(redirect).is_err() {
            debug!("Redirect dropped, receiver closed");
        }
    }
}
