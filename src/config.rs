//! Configuration for Turnstile
//!
//! CLI arguments and environment variable handling using clap. Key material
//! comes either from PEM files or from environment variables holding
//! base64-encoded PEM text; files take precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::auth::{Scope, TokenSettings};
use crate::gate::{DeadlineGate, DeadlinePolicy};
use crate::types::{Result, TurnstileError};

/// Turnstile - trust core for account onboarding
#[derive(Parser, Debug, Clone)]
#[command(name = "turnstile")]
#[command(about = "Session tokens, password hashing and deadline-bounded handlers")]
pub struct Args {
    /// Token keys and lifetimes
    #[command(flatten)]
    pub tokens: TokenArgs,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// What to do with work still running at the deadline (abandon, abort)
    #[arg(long, env = "DEADLINE_POLICY", default_value = "abandon")]
    pub deadline_policy: DeadlinePolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Token key material and lifetimes
#[derive(Parser, Debug, Clone)]
pub struct TokenArgs {
    /// Base64-encoded PEM private key (PKCS#1 or PKCS#8)
    #[arg(long, env = "TOKEN_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Base64-encoded PEM public key (SPKI or PKCS#1)
    #[arg(long, env = "TOKEN_PUBLIC_KEY")]
    pub public_key: Option<String>,

    /// Path to a PEM private key; overrides TOKEN_PRIVATE_KEY
    #[arg(long, env = "TOKEN_PRIVATE_KEY_FILE")]
    pub private_key_file: Option<PathBuf>,

    /// Path to a PEM public key; overrides TOKEN_PUBLIC_KEY
    #[arg(long, env = "TOKEN_PUBLIC_KEY_FILE")]
    pub public_key_file: Option<PathBuf>,

    /// Access token lifetime in seconds
    #[arg(long, env = "TOKEN_ACCESS_TTL_SECS", default_value = "900")]
    pub access_ttl_secs: i64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "TOKEN_REFRESH_TTL_SECS", default_value = "604800")]
    pub refresh_ttl_secs: i64,

    /// Clock skew tolerated when checking token times, in seconds
    #[arg(long, env = "TOKEN_LEEWAY_SECS", default_value = "0")]
    pub leeway_secs: i64,
}

/// Operator commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the token key pair and prove it can sign and verify
    CheckKeys,

    /// Check a password against the strength policy and print its hash
    HashPassword { password: String },

    /// Check a password against a stored hash
    VerifyPassword { encoded: String, password: String },

    /// Issue a token for a subject
    IssueToken {
        subject: Uuid,

        #[arg(long, default_value = "access")]
        scope: Scope,

        /// Lifetime override in seconds (defaults to the configured TTL)
        #[arg(long, allow_hyphen_values = true)]
        ttl_secs: Option<i64>,
    },

    /// Verify a token and print its claims
    VerifyToken {
        token: String,

        /// Require this scope
        #[arg(long)]
        scope: Option<Scope>,
    },

    /// Run synthetic work of the given duration through the deadline gate
    GateProbe {
        #[arg(long, default_value = "10")]
        work_ms: u64,
    },
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn gate(&self) -> DeadlineGate {
        DeadlineGate::new(self.request_timeout()).with_policy(self.deadline_policy)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.tokens.access_ttl_secs <= 0 {
            return Err("TOKEN_ACCESS_TTL_SECS must be greater than zero".to_string());
        }

        if self.tokens.refresh_ttl_secs <= 0 {
            return Err("TOKEN_REFRESH_TTL_SECS must be greater than zero".to_string());
        }

        if self.tokens.leeway_secs < 0 {
            return Err("TOKEN_LEEWAY_SECS must not be negative".to_string());
        }

        self.tokens.settings().map_err(|e| e.to_string())?;

        Ok(())
    }
}

impl TokenArgs {
    pub fn settings(&self) -> Result<TokenSettings> {
        Ok(TokenSettings {
            access_ttl: seconds("TOKEN_ACCESS_TTL_SECS", self.access_ttl_secs)?,
            refresh_ttl: seconds("TOKEN_REFRESH_TTL_SECS", self.refresh_ttl_secs)?,
            leeway: seconds("TOKEN_LEEWAY_SECS", self.leeway_secs)?,
        })
    }

    pub fn private_key_pem(&self) -> Result<String> {
        load_pem(
            "TOKEN_PRIVATE_KEY",
            self.private_key_file.as_deref(),
            self.private_key.as_deref(),
        )
    }

    pub fn public_key_pem(&self) -> Result<String> {
        load_pem(
            "TOKEN_PUBLIC_KEY",
            self.public_key_file.as_deref(),
            self.public_key.as_deref(),
        )
    }
}

fn seconds(name: &str, secs: i64) -> Result<chrono::Duration> {
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| TurnstileError::Config(format!("{name} is out of range")))
}

fn load_pem(name: &str, file: Option<&Path>, inline: Option<&str>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path).map_err(|e| {
            TurnstileError::Config(format!("cannot read {name} from {}: {e}", path.display()))
        });
    }

    let value = inline
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TurnstileError::Config(format!("{name} is not configured")))?;

    // Accept raw PEM as well as the base64-wrapped form.
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    let bytes = STANDARD
        .decode(value)
        .map_err(|e| TurnstileError::Config(format!("{name} is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| TurnstileError::Config(format!("{name} does not decode to PEM text")))
}
