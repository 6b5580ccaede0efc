//! Request and response payloads for the banking backend.
//!
//! Request bodies are typed so callers cannot send malformed JSON. Response
//! payloads are decoded leniently: unknown fields are kept in `extra` and
//! missing ones default, since the backend owns their shape.
//!
//! - `LoginRequest`, `RegisterRequest`, `LoginData`: identity lifecycle
//! - `ProfileUpdate`, `TransactionLimits`: account settings
//! - `AccountInfo`, `Notification`: dashboard data
//! - `CardApplication`: card issuance requests

pub mod account;
pub mod auth;
pub mod cards;
pub mod settings;

pub use account::{AccountInfo, DashboardSnapshot, Notification};
pub use auth::{
    ForgotPasswordRequest, LoginData, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
pub use cards::{CardApplication, CardNetwork, CardType};
pub use settings::{LanguageUpdate, MarkReadRequest, ProfileUpdate, TransactionLimits, UserSettings};
