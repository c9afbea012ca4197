//! Password hashing and verification using Argon2id
//!
//! Hashes are stored in PHC string form
//!
//! ```text
//! $argon2id$v=19$m=65536,t=3,p=2$<salt>$<hash>
//! ```
//!
//! with unpadded base64 for salt and hash. Verification re-derives with the
//! parameters and salt recorded in the stored string, not the hasher's current
//! defaults, so tuning can change without invalidating existing credentials.

use std::fmt;

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use tracing::debug;

use crate::types::{AuthError, PasswordPolicyError};

// =============================================================================
// Constants
// =============================================================================

/// Algorithm tag in the encoded form
pub const ALGORITHM_TAG: &str = "argon2id";

/// Argon2id memory cost in KiB (64 MiB)
pub const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;

/// Argon2id iteration count
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Argon2id parallelism (lanes)
pub const DEFAULT_PARALLELISM: u32 = 2;

/// Salt length (16 bytes)
pub const SALT_LEN: usize = 16;

/// Derived key length (32 bytes)
pub const KEY_LEN: usize = 32;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// `$`-separated fields in an encoded hash, counting the empty leading one.
const ENCODED_FIELDS: usize = 6;

// =============================================================================
// Parameters
// =============================================================================

/// Argon2id tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub key_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
            key_len: KEY_LEN,
        }
    }
}

impl HashParams {
    fn argon2(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.key_len),
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

// =============================================================================
// Encoded form
// =============================================================================

/// A serialized Argon2id hash. Never compared to another `EncodedHash`; only
/// a fresh derivation from a candidate password is compared against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedHash(String);

impl EncodedHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EncodedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a stored hash could not be used. Internal diagnostics only; callers
/// see `AuthError::InvalidCredential` for all of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum StoredHashError {
    #[error("invalid encoded hash")]
    FieldCount,
    #[error("unsupported algorithm: {0}")]
    Algorithm(String),
    #[error("argon2 version mismatch: got {got:?} want {want}")]
    VersionMismatch { got: Option<u32>, want: u32 },
    #[error("missing parameter {0}")]
    MissingParam(&'static str),
    #[error("{0}")]
    Format(argon2::password_hash::Error),
}

/// Parse a stored hash, accepting only the six-field Argon2id v19 form.
fn parse_stored(encoded: &str) -> Result<PasswordHash<'_>, StoredHashError> {
    // ["", "argon2id", "v=19", "m=..,t=..,p=..", "<salt>", "<hash>"]
    let fields: Vec<&str> = encoded.split('$').collect();
    if fields.len() != ENCODED_FIELDS || !fields[0].is_empty() {
        return Err(StoredHashError::FieldCount);
    }

    let parsed = PasswordHash::new(encoded).map_err(StoredHashError::Format)?;

    if parsed.algorithm.as_str() != ALGORITHM_TAG {
        return Err(StoredHashError::Algorithm(parsed.algorithm.to_string()));
    }

    let want = Version::V0x13 as u32;
    if parsed.version != Some(want) {
        return Err(StoredHashError::VersionMismatch {
            got: parsed.version,
            want,
        });
    }

    for name in ["m", "t", "p"] {
        if parsed.params.get_str(name).is_none() {
            return Err(StoredHashError::MissingParam(name));
        }
    }

    Ok(parsed)
}

// =============================================================================
// Hasher
// =============================================================================

/// Derives and checks Argon2id password hashes.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    params: HashParams,
}

impl PasswordHasher {
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HashParams {
        &self.params
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<EncodedHash, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = self
            .params
            .argon2()
            .map_err(|e| AuthError::Hashing(format!("invalid Argon2 params: {e}")))?;

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| EncodedHash(hash.to_string()))
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Verify a password against a stored encoded hash.
    ///
    /// Malformed hashes and wrong passwords both return
    /// `AuthError::InvalidCredential`.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<(), AuthError> {
        let parsed = parse_stored(encoded).map_err(|e| {
            debug!(reason = %e, "stored password hash rejected");
            AuthError::InvalidCredential
        })?;

        // Parameters come from `parsed`; the hasher's own tunables are not used.
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|e| {
                debug!(reason = %e, "password does not match");
                AuthError::InvalidCredential
            })
    }
}

// =============================================================================
// Strength policy
// =============================================================================

/// Check a new password against the strength policy.
///
/// Requires at least 8 characters with an uppercase letter, a lowercase
/// letter, a digit and a punctuation or symbol character. Every unmet rule is
/// reported.
pub fn validate_strength(password: &str) -> Result<(), PasswordPolicyError> {
    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_numeric() {
            has_digit = true;
        } else if c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()) {
            has_special = true;
        }
    }

    let mut reasons = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        reasons.push("must be at least 8 characters");
    }
    if !has_upper {
        reasons.push("must contain an uppercase letter");
    }
    if !has_lower {
        reasons.push("must contain a lowercase letter");
    }
    if !has_digit {
        reasons.push("must contain a number");
    }
    if !has_special {
        reasons.push("must contain a special character");
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(PasswordPolicyError { reasons })
    }
}
