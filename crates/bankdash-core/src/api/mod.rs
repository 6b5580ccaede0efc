//! REST API client module for the banking backend.
//!
//! This module provides the `ApiClient` for communicating with the backend
//! for identity, settings, account, notification and card operations.
//!
//! Every response is a `{success, data, message}` envelope. The client
//! attaches the stored session token as a bearer credential and applies one
//! global policy to authorization failures: clear the session and redirect
//! to the login page.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::ApiClient;
pub use envelope::{ApiOutcome, Envelope};
pub use error::ApiError;
