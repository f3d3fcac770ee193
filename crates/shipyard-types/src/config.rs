//! configuration types for shipyard

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::Error;

/// default callback token lifetime when minting (one day).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;

/// maximum supported callback token lifetime (thirty days).
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 86_400;

/// default cap on a build callback body (64 MiB); build logs can be large.
pub const DEFAULT_MAX_CALLBACK_BODY_BYTES: usize = 64 * 1024 * 1024;

/// main configuration for shipyard.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// address to bind the http server to.
    pub listen_addr: String,

    /// database configuration.
    pub database: DatabaseConfig,

    /// machine callback token configuration.
    pub token: TokenConfig,

    /// largest build callback body accepted, in bytes.
    pub max_callback_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database: DatabaseConfig::default(),
            token: TokenConfig::default(),
            max_callback_body_bytes: DEFAULT_MAX_CALLBACK_BODY_BYTES,
        }
    }
}

/// database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// database type: "sqlite" or "postgres".
    pub db_type: String,

    /// database connection string or file path.
    pub connection_string: String,

    /// sqlite-specific options.
    pub sqlite: SqliteConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            connection_string: "/var/lib/shipyard/db.sqlite".to_string(),
            sqlite: SqliteConfig::default(),
        }
    }
}

/// sqlite options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// enable write-ahead logging.
    pub write_ahead_log: bool,
}

/// configuration for machine callback tokens (hs256 jwt).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// shared signing secret. when unset, every callback fails with a
    /// server error rather than an authentication error.
    pub secret: Option<SecretString>,

    /// clock skew tolerance applied to `exp`, in seconds.
    pub leeway_secs: u64,

    /// lifetime of minted tokens, in seconds.
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            leeway_secs: 60,
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl TokenConfig {
    /// returns true when a non-blank signing secret is configured.
    pub fn is_configured(&self) -> bool {
        self.secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().trim().is_empty())
    }

    /// validate settings needed to mint tokens.
    pub fn validate_for_minting(&self) -> Result<(), Error> {
        if !self.is_configured() {
            return Err(Error::Config("token.secret is required".to_string()));
        }
        if self.ttl_secs == 0 {
            return Err(Error::Config(
                "token.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(Error::Config(format!(
                "token.ttl_secs must be at most {MAX_TOKEN_TTL_SECS}"
            )));
        }
        Ok(())
    }
}
