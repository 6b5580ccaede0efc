use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{cookies, keys, JsonFileStore, KeyValueStore, MemoryStore};
use crate::storage::{COOKIE_FILE, LOCAL_STORAGE_FILE};

/// A token together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A session is expired from the expiry instant onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// Format a timestamp the way the stores hold it (RFC 3339, millisecond
/// precision, `Z` suffix).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Unparseable values count as absent.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Single owner of the client-held session state.
///
/// Token and expiry live in local storage and are mirrored into cookies.
/// Readers go through `token()` / `is_valid()`; only `establish()` and
/// `clear()` mutate them.
pub struct SessionContext {
    storage: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn KeyValueStore>,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn KeyValueStore>, cookies: Arc<dyn KeyValueStore>) -> Self {
        Self { storage, cookies }
    }

    /// Session backed by volatile stores
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Session backed by `storage.json` and `cookies.json` in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let storage = JsonFileStore::open(dir.join(LOCAL_STORAGE_FILE))?;
        let cookies = JsonFileStore::open(dir.join(COOKIE_FILE))?;
        Ok(Self::new(Arc::new(storage), Arc::new(cookies)))
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(keys::TOKEN).filter(|t| !t.is_empty())
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.storage
            .get(keys::EXPIRES_AT)
            .and_then(|v| parse_timestamp(&v))
    }

    /// Token and expiry, if both are present and readable
    pub fn data(&self) -> Option<SessionData> {
        Some(SessionData {
            token: self.token()?,
            expires_at: self.expires_at()?,
        })
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.data().map(|d| !d.is_expired_at(now)).unwrap_or(false)
    }

    /// Store a freshly issued session in local storage and cookies.
    ///
    /// All four keys are written or none are: if any write fails, whatever
    /// was already written is cleared before the error is returned.
    pub fn establish(&self, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let expiry = format_timestamp(expires_at);
        if let Err(e) = self.write_session(token, &expiry) {
            warn!(error = %e, "Failed to store session, rolling back");
            self.clear();
            return Err(e);
        }
        debug!(expires_at = %expiry, "Session established");
        Ok(())
    }

    fn write_session(&self, token: &str, expiry: &str) -> Result<()> {
        self.storage.set(keys::TOKEN, token)?;
        self.storage.set(keys::EXPIRES_AT, expiry)?;
        self.cookies.set(cookies::TOKEN, token)?;
        self.cookies.set(cookies::EXPIRY, expiry)?;
        Ok(())
    }

    /// Remove token and expiry from local storage and cookies.
    ///
    /// Safe to call repeatedly. Store failures are logged and the remaining
    /// keys are still removed. Returns true if a token was present.
    pub fn clear(&self) -> bool {
        let had_token = self.has_token();
        let removals = [
            (&self.storage, keys::TOKEN),
            (&self.storage, keys::EXPIRES_AT),
            (&self.cookies, cookies::TOKEN),
            (&self.cookies, cookies::EXPIRY),
        ];
        for (store, key) in removals {
            if let Err(e) = store.remove(key) {
                warn!(key = key, error = %e, "Failed to clear session key");
            }
        }
        if had_token {
            debug!("Session cleared");
        }
        had_token
    }

    // ===== Password reset flow =====

    pub fn reset_email(&self) -> Option<String> {
        self.storage.get(keys::RESET_EMAIL)
    }

    pub fn set_reset_email(&self, email: &str) -> Result<()> {
        self.storage.set(keys::RESET_EMAIL, email)
    }

    pub fn reset_token(&self) -> Option<String> {
        self.storage.get(keys::RESET_TOKEN)
    }

    pub fn set_reset_token(&self, token: &str) -> Result<()> {
        self.storage.set(keys::RESET_TOKEN, token)
    }

    pub fn clear_reset(&self) -> Result<()> {
        self.storage.remove(keys::RESET_EMAIL)?;
        self.storage.remove(keys::RESET_TOKEN)?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("has_token", &self.has_token())
            .field("expires_at", &self.expires_at())
            .finish()
    }
}
