//! Authentication for Turnstile
//!
//! Provides:
//! - RSA key material loading (PKCS#1 / PKCS#8 / SPKI PEM)
//! - RS256 session token issuance and verification
//! - Policy expectations evaluated against verified claims
//! - Password hashing with Argon2id

pub mod claims;
pub mod expectation;
pub mod jwt;
pub mod keys;
pub mod password;

pub use claims::{Claims, Scope, SignedToken, BEARER_SCHEME};
pub use expectation::Expectation;
pub use jwt::{TokenEngine, TokenSettings};
pub use keys::{parse_private_key, parse_public_key, KeyPair, PemEncoding};
pub use password::{validate_strength, EncodedHash, HashParams, PasswordHasher};
