//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionContext`: The single owner of the stored token and expiry
//! - `SessionMonitor`: Expiry and inactivity supervision for a mounted session
//! - `CredentialStore`: Secure OS-level credential storage via keyring
//!
//! Sessions end at their absolute expiry or after 30 minutes without
//! interaction, whichever comes first.

pub mod credentials;
pub mod monitor;
pub mod session;

pub use credentials::CredentialStore;
pub use monitor::{
    Clock, ExpiryCause, InteractionKind, MonitorHandle, MonitorSettings, SessionMachine,
    SessionMonitor, SessionState, SystemClock,
};
pub use session::{SessionContext, SessionData};
