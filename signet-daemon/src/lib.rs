//! Signet daemon: HTTP front end for the `signet-auth` core.
//!
//! Owns all IO: SQLite persistence for users, contacts and messages, the
//! axum router with its guards, configuration and rate limiting.

pub mod api;
pub mod config;
pub mod contacts;
pub mod db;
pub mod directory;
pub mod messages;
pub mod rate_limit;

pub use api::{router, AppState};
pub use config::ServerConfig;
pub use db::Database;

/// Current Unix time in seconds.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs() as i64
}
