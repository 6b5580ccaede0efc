//! The `{success, data, message}` wrapper every backend response uses.
//!
//! A response body is decoded once into `ApiOutcome`; the rest of the client
//! only ever matches on that sum type.

use serde::Deserialize;

/// Message prefix the backend uses for rejected or missing credentials
const NOT_AUTHORIZED_PREFIX: &str = "not authorized";

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// `success: true`, carrying `data` (null when absent)
    Success(serde_json::Value),
    /// `success: false` with a credential rejection message
    NotAuthorized(String),
    /// `success: false` for any other reason
    Failure(Option<String>),
}

impl Envelope {
    /// Parse a response body. Returns None when the body is not an envelope.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    pub fn into_outcome(self) -> ApiOutcome {
        if self.success {
            return ApiOutcome::Success(self.data);
        }
        match self.message {
            Some(message) if is_not_authorized(&message) => ApiOutcome::NotAuthorized(message),
            message => ApiOutcome::Failure(message.filter(|m| !m.trim().is_empty())),
        }
    }
}

/// True for messages such as "Not authorized, token failed"
pub fn is_not_authorized(message: &str) -> bool {
    message
        .trim()
        .to_lowercase()
        .starts_with(NOT_AUTHORIZED_PREFIX)
}
