//! Shared trust state
//!
//! `TrustCore` bundles the token engine, password hasher and deadline gate.
//! It is built once at startup from configuration and is immutable after
//! that; clone it (or wrap it in an `Arc`) to share it between handlers.

use tracing::info;
use zeroize::Zeroizing;

use crate::auth::{EncodedHash, KeyPair, PasswordHasher, TokenEngine};
use crate::config::Args;
use crate::gate::DeadlineGate;
use crate::types::{AuthError, Result, TurnstileError};

#[derive(Clone)]
pub struct TrustCore {
    pub tokens: TokenEngine,
    pub passwords: PasswordHasher,
    pub gate: DeadlineGate,
}

impl TrustCore {
    pub fn new(tokens: TokenEngine, passwords: PasswordHasher, gate: DeadlineGate) -> Self {
        Self {
            tokens,
            passwords,
            gate,
        }
    }

    /// Load keys and build every component from configuration.
    ///
    /// Fails if the key pair is missing, unparseable or mismatched.
    pub fn from_args(args: &Args) -> Result<Self> {
        let private_pem = args.tokens.private_key_pem()?;
        let public_pem = args.tokens.public_key_pem()?;

        let keys = KeyPair::from_pem(&private_pem, &public_pem)?;
        info!(
            private = %keys.private.encoding,
            public = %keys.public.encoding,
            "token keys loaded"
        );

        let tokens = TokenEngine::new(keys, args.tokens.settings()?)?;
        Ok(Self::new(tokens, PasswordHasher::default(), args.gate()))
    }

    /// Hash on the blocking pool. Argon2 at the default cost is CPU-bound.
    pub async fn hash_password(&self, password: String) -> Result<EncodedHash> {
        let hasher = self.passwords.clone();
        let password = Zeroizing::new(password);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| TurnstileError::Internal(format!("hashing task failed: {e}")))?
            .map_err(TurnstileError::from)
    }

    /// Verify on the blocking pool. The plaintext is wiped once the task ends.
    pub async fn verify_password(&self, password: String, encoded: String) -> Result<()> {
        let hasher = self.passwords.clone();
        let password = Zeroizing::new(password);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
            .await
            .map_err(|e| TurnstileError::Internal(format!("verification task failed: {e}")))?
            .map_err(|e: AuthError| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{fixtures, HashParams};
    use clap::Parser;
    use std::time::Duration;

    fn core() -> TrustCore {
        let fast = PasswordHasher::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            ..HashParams::default()
        });
        TrustCore::new(fixtures::engine(), fast, DeadlineGate::new(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_password_roundtrip_off_runtime() {
        let core = core();
        let encoded = core.hash_password("Str0ng!pass".into()).await.unwrap();

        core.verify_password("Str0ng!pass".into(), encoded.to_string())
            .await
            .unwrap();

        let err = core
            .verify_password("wrong".into(), encoded.into_string())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnstileError::Auth(AuthError::InvalidCredential)));
    }

    #[test]
    fn test_from_args_with_key_files() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let private = dir.join("rsa_pkcs8.pem");
        let public = dir.join("rsa_spki.pub.pem");

        let args = Args::try_parse_from([
            "turnstile",
            "--private-key-file",
            private.to_str().unwrap(),
            "--public-key-file",
            public.to_str().unwrap(),
            "--request-timeout-ms",
            "250",
            "check-keys",
        ])
        .unwrap();

        let core = TrustCore::from_args(&args).unwrap();
        assert_eq!(core.gate.timeout(), Duration::from_millis(250));
        assert_eq!(core.tokens.settings().access_ttl.num_seconds(), 900);
    }

    #[test]
    fn test_from_args_rejects_mismatched_pair() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let args = Args::try_parse_from([
            "turnstile",
            "--private-key-file",
            dir.join("rsa_pkcs1.pem").to_str().unwrap(),
            "--public-key-file",
            dir.join("other_spki.pub.pem").to_str().unwrap(),
            "check-keys",
        ])
        .unwrap();

        let err = TrustCore::from_args(&args).err().unwrap();
        assert!(matches!(err, TurnstileError::Auth(AuthError::KeyFormat(_))));
    }
}
