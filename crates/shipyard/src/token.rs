//! machine callback tokens.
//!
//! a build machine authenticates its completion callback with an hs256 jwt
//! minted when the build was started. the token names exactly one machine;
//! the callback handler refuses to touch any other row.
//!
//! ## Claims
//!
//! - `machine_id` (string, required, non-empty)
//! - `iat` (unix seconds, required; a fractional part is dropped)
//! - `endpoint` (string, optional)
//! - `exp` (unix seconds, optional, enforced when present)

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use shipyard_types::{MachineId, TokenConfig};
use thiserror::Error;

/// why a callback token was not accepted.
///
/// header and signature failures are kept apart so logs and tests can tell
/// them apart, even though callers see the same 401 for all of them.
#[derive(Debug, Error)]
pub enum TokenError {
    /// no Authorization header
    #[error("missing Authorization header")]
    MissingHeader,
    /// header present but not `Bearer <token>`
    #[error("malformed Authorization header")]
    MalformedHeader,
    /// the server has no signing secret
    #[error("machine token signing secret is not configured")]
    SecretUnconfigured,
    /// signature valid but `exp` is in the past
    #[error("token has expired")]
    Expired,
    /// undecodable token, wrong algorithm or bad signature
    #[error("invalid token: {0}")]
    InvalidSignature(String),
    /// signature valid but the payload has the wrong shape
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),
    /// signing a new token failed
    #[error("token minting failed: {0}")]
    Mint(String),
}

impl TokenError {
    /// stable short name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::MalformedHeader => "malformed_header",
            Self::SecretUnconfigured => "secret_unconfigured",
            Self::Expired => "expired",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::Mint(_) => "mint",
        }
    }

    /// whether the failure is the server's fault rather than the caller's.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::SecretUnconfigured | Self::Mint(_))
    }
}

/// wire format of the token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineClaims {
    /// machine this token may report for.
    pub machine_id: MachineId,
    /// endpoint known when the token was minted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// issued-at (unix seconds).
    #[serde(deserialize_with = "unix_seconds")]
    pub iat: i64,
    /// expiry (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// any json number, truncated to whole seconds.
fn unix_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let n = serde_json::Number::deserialize(deserializer)?;
    n.as_i64()
        .or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        })
        .ok_or_else(|| de::Error::custom(format!("{n} is not a unix timestamp")))
}

/// identity extracted from a verified token. lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaim {
    /// machine the caller authenticated as.
    pub machine_id: MachineId,
    /// endpoint carried by the token, if any.
    pub endpoint: Option<String>,
    /// when the token was issued.
    pub issued_at: DateTime<Utc>,
}

impl TryFrom<MachineClaims> for VerifiedClaim {
    type Error = TokenError;

    fn try_from(claims: MachineClaims) -> Result<Self, Self::Error> {
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| TokenError::InvalidClaims("iat out of range".to_string()))?;
        Ok(Self {
            machine_id: claims.machine_id,
            endpoint: claims.endpoint,
            issued_at,
        })
    }
}

/// verifies machine callback tokens against the configured secret.
///
/// built once at startup from [`TokenConfig`] and shared by every request.
#[derive(Debug)]
pub struct MachineTokenVerifier {
    secret: Option<SecretString>,
    leeway_secs: u64,
}

impl MachineTokenVerifier {
    /// create a verifier from token configuration. a blank secret counts as unset.
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config
            .secret
            .as_ref()
            .filter(|s| !s.expose_secret().trim().is_empty())
            .cloned();
        Self {
            secret,
            leeway_secs: config.leeway_secs,
        }
    }

    /// whether a signing secret is available.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// verify a raw `Authorization` header value.
    ///
    /// header shape is checked before the secret so a caller without a
    /// token gets 401 even on a misconfigured server.
    pub fn verify_authorization(&self, header: Option<&str>) -> Result<VerifiedClaim, TokenError> {
        let header = header.ok_or(TokenError::MissingHeader)?;
        let token = parse_bearer_token(header).ok_or(TokenError::MalformedHeader)?;
        self.verify(token)
    }

    /// verify a bare token string.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaim, TokenError> {
        let secret = self.secret.as_ref().ok_or(TokenError::SecretUnconfigured)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.validate_aud = false;
        // exp is checked when present but not required
        validation.set_required_spec_claims::<&str>(&[]);

        let data = jsonwebtoken::decode::<Value>(
            token,
            &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::InvalidSignature(e.to_string()),
        })?;

        let claims: MachineClaims = serde_json::from_value(data.claims)
            .map_err(|e| TokenError::InvalidClaims(e.to_string()))?;

        claims.try_into()
    }
}

/// parse a Bearer token from the Authorization header
pub fn parse_bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// a freshly signed callback token.
#[derive(Debug, Clone)]
pub struct MintedToken {
    /// signed jwt.
    pub token: String,
    /// when the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// mint a callback token for `machine_id`.
pub fn mint_machine_token(
    config: &TokenConfig,
    machine_id: &MachineId,
    endpoint: Option<&str>,
    now: DateTime<Utc>,
) -> Result<MintedToken, TokenError> {
    config
        .validate_for_minting()
        .map_err(|e| TokenError::Mint(e.to_string()))?;
    let secret = config
        .secret
        .as_ref()
        .ok_or(TokenError::SecretUnconfigured)?;

    let ttl = Duration::seconds(i64::try_from(config.ttl_secs).unwrap_or(i64::MAX));
    let expires_at = now + ttl;
    let claims = MachineClaims {
        machine_id: machine_id.clone(),
        endpoint: endpoint.map(str::to_string),
        iat: now.timestamp(),
        exp: Some(expires_at.timestamp()),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| TokenError::Mint(e.to_string()))?;

    Ok(MintedToken { token, expires_at })
}
