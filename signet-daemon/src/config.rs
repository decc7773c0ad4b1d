//! Environment-driven configuration.
//!
//! Read once at startup, after `.env` has been loaded. Every variable is
//! optional; see [`ServerConfig::from_env`] for defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use signet_auth::credential::DEFAULT_TOKEN_TTL_SECONDS;
use signet_auth::nonce::DEFAULT_CHALLENGE_TTL;
use signet_auth::{CredentialError, CredentialIssuer, SenderPolicy, TokenSecret};

const DEFAULT_RATE_PER_SECOND: u32 = 2;
const DEFAULT_RATE_BURST: u32 = 10;

/// Errors while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Daemon settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    /// HMAC secret for session tokens. `None` means generate one per process.
    pub token_secret: Option<String>,
    pub token_ttl: Duration,
    pub challenge_ttl: Duration,
    pub sender_policy: SenderPolicy,
    pub rate_per_second: u32,
    pub rate_burst: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            db_path: default_data_dir().join("signet.db"),
            token_secret: None,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS as u64),
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
            sender_policy: SenderPolicy::RegisteredOnly,
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            rate_burst: DEFAULT_RATE_BURST,
        }
    }
}

impl ServerConfig {
    /// Build the config from `SIGNET_*` environment variables.
    ///
    /// | Variable                 | Default                           |
    /// |--------------------------|-----------------------------------|
    /// | `SIGNET_BIND`            | `127.0.0.1:3000`                  |
    /// | `SIGNET_DB_PATH`         | `{data_local_dir}/signet/signet.db` |
    /// | `SIGNET_TOKEN_SECRET`    | random per process                |
    /// | `SIGNET_TOKEN_TTL`       | `72h`                             |
    /// | `SIGNET_CHALLENGE_TTL`   | `2m`                              |
    /// | `SIGNET_SENDER_POLICY`   | `registered` (or `any`)           |
    /// | `SIGNET_RATE_PER_SECOND` | `2`                               |
    /// | `SIGNET_RATE_BURST`      | `10`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("SIGNET_BIND") {
            config.bind = value.parse().map_err(|_| invalid("SIGNET_BIND", &value))?;
        }
        if let Some(value) = lookup("SIGNET_DB_PATH") {
            config.db_path = PathBuf::from(value);
        }
        config.token_secret = lookup("SIGNET_TOKEN_SECRET").filter(|s| !s.is_empty());
        if let Some(value) = lookup("SIGNET_TOKEN_TTL") {
            config.token_ttl =
                parse_duration(&value).ok_or_else(|| invalid("SIGNET_TOKEN_TTL", &value))?;
        }
        if let Some(value) = lookup("SIGNET_CHALLENGE_TTL") {
            config.challenge_ttl = parse_duration(&value)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| invalid("SIGNET_CHALLENGE_TTL", &value))?;
        }
        if let Some(value) = lookup("SIGNET_SENDER_POLICY") {
            config.sender_policy = match value.trim().to_ascii_lowercase().as_str() {
                "registered" | "registered-only" => SenderPolicy::RegisteredOnly,
                "any" | "any-key" => SenderPolicy::AnyKey,
                _ => return Err(invalid("SIGNET_SENDER_POLICY", &value)),
            };
        }
        if let Some(value) = lookup("SIGNET_RATE_PER_SECOND") {
            config.rate_per_second = value
                .trim()
                .parse()
                .map_err(|_| invalid("SIGNET_RATE_PER_SECOND", &value))?;
        }
        if let Some(value) = lookup("SIGNET_RATE_BURST") {
            config.rate_burst = value
                .trim()
                .parse()
                .map_err(|_| invalid("SIGNET_RATE_BURST", &value))?;
        }

        Ok(config)
    }

    /// Build the session credential issuer from the configured secret and TTL.
    ///
    /// Without `SIGNET_TOKEN_SECRET` a random secret is generated, so every
    /// restart logs all users out.
    pub fn token_issuer(&self) -> Result<CredentialIssuer, CredentialError> {
        let secret = match &self.token_secret {
            Some(secret) => TokenSecret::new(secret.as_bytes().to_vec())?,
            None => {
                tracing::warn!(
                    "SIGNET_TOKEN_SECRET not set; using a per-process secret, sessions end at restart"
                );
                TokenSecret::generate()
            }
        };
        let ttl = i64::try_from(self.token_ttl.as_secs()).unwrap_or(i64::MAX);
        Ok(CredentialIssuer::new(secret, ttl))
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value: value.to_owned(),
    }
}

/// `{data_local_dir}/signet`, or `./signet` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("signet")
}

/// Parse a duration string like "90s", "5m", "72h" or "7d".
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, unit) = match s.as_bytes()[s.len() - 1] {
        b's' => (&s[..s.len() - 1], 1),
        b'm' => (&s[..s.len() - 1], 60),
        b'h' => (&s[..s.len() - 1], 3600),
        b'd' => (&s[..s.len() - 1], 86_400),
        _ => (s, 1),
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num.checked_mul(unit)?))
}
