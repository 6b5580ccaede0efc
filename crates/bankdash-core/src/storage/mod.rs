//! Client-side key/value storage.
//!
//! Two stores back the session: "local storage" (token, expiry and the
//! password-reset scratch values) and "cookies" (a mirror of token and
//! expiry). Both are `KeyValueStore`s, file-backed in the application and
//! in-memory under test.

pub mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

/// Local storage file name in the cache directory
pub const LOCAL_STORAGE_FILE: &str = "storage.json";

/// Cookie jar file name in the cache directory
pub const COOKIE_FILE: &str = "cookies.json";

/// Local storage keys
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const EXPIRES_AT: &str = "expires_at";
    pub const RESET_EMAIL: &str = "resetEmail";
    pub const RESET_TOKEN: &str = "resetToken";
}

/// Cookie names
pub mod cookies {
    pub const TOKEN: &str = "token";
    pub const EXPIRY: &str = "expiry";
}
