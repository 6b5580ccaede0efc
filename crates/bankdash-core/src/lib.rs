//! Core library for bankdash.
//!
//! Provides the pieces a bankdash front end is built on:
//!
//! - `auth`: session context, session monitor, keychain credentials
//! - `api`: REST client for the banking backend
//! - `models`: request and response payloads
//! - `navigation`: page routes and redirect delivery
//! - `storage`: key/value stores backing local storage and cookies
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{MonitorHandle, SessionContext, SessionMonitor, SessionState};
pub use config::Config;
pub use navigation::{ChannelNavigator, Navigator, Redirect, Route, SessionNotice};
