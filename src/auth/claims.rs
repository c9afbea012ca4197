//! Session token claims
//!
//! Wire form of the payload:
//!
//! ```json
//! {"token_id": "<uuid>", "user_id": "<uuid>", "scope": "access",
//!  "iat": 1700000000, "nbf": 1700000000, "exp": 1700003600}
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authentication scheme reported alongside issued tokens.
pub const BEARER_SCHEME: &str = "bearer";

/// What a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Access,
    Refresh,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

/// Payload stored in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Unique per issued token. Absent ids decode as nil and are rejected.
    #[serde(default)]
    pub token_id: Uuid,
    /// Subject the session belongs to
    #[serde(default)]
    pub user_id: Uuid,
    pub scope: Scope,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A signed token plus what the transport needs to store it.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// Compact JWS text
    pub token: String,
    pub claims: Claims,
    /// Absolute expiry, used to size cookie lifetimes
    pub expires_at: DateTime<Utc>,
    pub scheme: &'static str,
}

impl SignedToken {
    /// Seconds until expiry, floored at zero.
    pub fn max_age(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
