//! Session token issuance and verification
//!
//! Tokens are compact JWS signed with RS256. Verification runs in a fixed
//! order and stops at the first failure:
//!
//! 1. parse the envelope, RS256 only (`MalformedToken`)
//! 2. check the signature (`SignatureInvalid`)
//! 3. decode the claims (`MalformedToken`)
//! 4. check `exp`, then `nbf`/`iat` (`TokenExpired`, `TokenNotYetValid`)
//! 5. reject nil `user_id` / `token_id` (`MissingClaim`)
//! 6. run caller expectations in order (`ExpectationFailed`)
//!
//! There is no revocation store; `token_id` only distinguishes credentials.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, Scope, SignedToken, BEARER_SCHEME};
use super::expectation::Expectation;
use super::keys::KeyPair;
use crate::types::AuthError;

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Default refresh token lifetime (7 days)
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Lifetimes and clock tolerance for issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Widens every temporal comparison. Zero means exact.
    pub leeway: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            leeway: Duration::zero(),
        }
    }
}

/// RS256 token issuer and verifier.
#[derive(Clone)]
pub struct TokenEngine {
    keys: KeyPair,
    settings: TokenSettings,
    validation: Validation,
}

impl TokenEngine {
    /// Build the engine and prove the key pair works.
    ///
    /// A probe token is signed and verified here so that a key which parses
    /// but cannot sign, or a public key from a different pair, fails at
    /// startup instead of on the first login.
    pub fn new(keys: KeyPair, settings: TokenSettings) -> Result<Self, AuthError> {
        // Time checks are done by hand so the clock can be injected and
        // expiry gets its own error.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        let engine = Self {
            keys,
            settings,
            validation,
        };

        let probe = engine
            .issue(Uuid::new_v4(), Scope::Access, Duration::minutes(1))
            .map_err(|e| AuthError::KeyFormat(format!("private key cannot sign: {e}")))?;
        engine.verify(&probe.token, &[]).map_err(|e| {
            AuthError::KeyFormat(format!("public key does not match private key: {e}"))
        })?;

        debug!(
            private = %engine.keys.private.encoding,
            public = %engine.keys.public.encoding,
            "token key pair verified"
        );

        Ok(engine)
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Issue an access token with the configured lifetime.
    pub fn issue_access(&self, user_id: Uuid) -> Result<SignedToken, AuthError> {
        self.issue(user_id, Scope::Access, self.settings.access_ttl)
    }

    /// Refresh tokens are not issued by this service.
    pub fn issue_refresh(&self, _user_id: Uuid) -> Result<SignedToken, AuthError> {
        Err(AuthError::Unsupported("refresh token issuance"))
    }

    /// Issue a token valid for `ttl` from now.
    pub fn issue(&self, user_id: Uuid, scope: Scope, ttl: Duration) -> Result<SignedToken, AuthError> {
        self.issue_at(user_id, scope, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        scope: Scope,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SignedToken, AuthError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Signing("token lifetime out of range".into()))?;

        let claims = Claims {
            token_id: Uuid::new_v4(),
            user_id,
            scope,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.keys.private.key,
        )
        .map_err(|e| AuthError::Signing(e.to_string()))?;

        debug!(token_id = %claims.token_id, %scope, exp = claims.exp, "token issued");

        Ok(SignedToken {
            token,
            claims,
            expires_at,
            scheme: BEARER_SCHEME,
        })
    }

    /// Verify a token against the wall clock.
    pub fn verify(&self, token: &str, expectations: &[Expectation]) -> Result<Claims, AuthError> {
        self.verify_at(token, expectations, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    pub fn verify_at(
        &self,
        token: &str,
        expectations: &[Expectation],
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.keys.public.key, &self.validation)
            .map_err(classify)?
            .claims;

        self.check_times(&claims, now.timestamp())?;

        if claims.user_id.is_nil() {
            return Err(AuthError::MissingClaim("user_id"));
        }
        if claims.token_id.is_nil() {
            return Err(AuthError::MissingClaim("token_id"));
        }

        for expectation in expectations {
            expectation
                .check(&claims)
                .map_err(AuthError::ExpectationFailed)?;
        }

        Ok(claims)
    }

    fn check_times(&self, claims: &Claims, now: i64) -> Result<(), AuthError> {
        let leeway = self.settings.leeway.num_seconds();

        if now >= claims.exp.saturating_add(leeway) {
            return Err(AuthError::TokenExpired);
        }
        if now.saturating_add(leeway) < claims.nbf || now.saturating_add(leeway) < claims.iat {
            return Err(AuthError::TokenNotYetValid);
        }
        Ok(())
    }
}

/// Map jsonwebtoken failures onto the verification taxonomy.
fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fixtures;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use jsonwebtoken::EncodingKey;
    use serde_json::json;

    fn subject() -> Uuid {
        Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
    }

    /// Sign an arbitrary payload with the engine's own private key.
    fn sign_raw(engine: &TokenEngine, payload: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::RS256),
            payload,
            &engine.keys.private.key,
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let engine = fixtures::engine();
        let now = Utc::now();

        let token = engine
            .issue_at(subject(), Scope::Access, Duration::hours(1), now)
            .unwrap();
        assert_eq!(token.scheme, "bearer");
        assert_eq!(token.expires_at, now + Duration::hours(1));
        assert!(!token.claims.token_id.is_nil());

        let claims = engine
            .verify_at(&token.token, &[Expectation::access()], now)
            .unwrap();
        assert_eq!(claims.user_id, subject());
        assert_eq!(claims.scope, Scope::Access);
        assert_eq!(claims, token.claims);

        let later = now + Duration::minutes(61);
        assert_eq!(
            engine.verify_at(&token.token, &[Expectation::access()], later),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_token_ids_are_fresh() {
        let engine = fixtures::engine();
        let a = engine.issue_access(subject()).unwrap();
        let b = engine.issue_access(subject()).unwrap();
        assert_ne!(a.claims.token_id, b.claims.token_id);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_non_positive_ttl_is_expired() {
        let engine = fixtures::engine();

        for ttl in [Duration::zero(), Duration::minutes(-1)] {
            let token = engine.issue(subject(), Scope::Access, ttl).unwrap();
            assert_eq!(
                engine.verify(&token.token, &[Expectation::access()]),
                Err(AuthError::TokenExpired)
            );
        }
    }

    #[test]
    fn test_scope_expectations() {
        let engine = fixtures::engine();

        let refresh = engine
            .issue(subject(), Scope::Refresh, Duration::hours(1))
            .unwrap();
        assert!(matches!(
            engine.verify(&refresh.token, &[Expectation::access()]),
            Err(AuthError::ExpectationFailed(_))
        ));
        assert!(engine.verify(&refresh.token, &[Expectation::refresh()]).is_ok());

        let access = engine.issue_access(subject()).unwrap();
        assert!(matches!(
            engine.verify(&access.token, &[Expectation::refresh()]),
            Err(AuthError::ExpectationFailed(_))
        ));
    }

    #[test]
    fn test_first_failing_expectation_wins() {
        let engine = fixtures::engine();
        let token = engine
            .issue(subject(), Scope::Refresh, Duration::hours(1))
            .unwrap();

        let result = engine.verify(
            &token.token,
            &[
                Expectation::custom(|_| Err("first".into())),
                Expectation::access(),
            ],
        );
        assert_eq!(result, Err(AuthError::ExpectationFailed("first".into())));
    }

    #[test]
    fn test_flipped_signature_is_signature_invalid() {
        let engine = fixtures::engine();
        let token = engine.issue_access(subject()).unwrap().token;

        let (message, signature) = token.rsplit_once('.').unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(signature).unwrap();
        bytes[10] ^= 0x01;
        let tampered = format!("{message}.{}", URL_SAFE_NO_PAD.encode(bytes));

        assert_eq!(
            engine.verify(&tampered, &[Expectation::access()]),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_foreign_key_is_signature_invalid() {
        let engine = fixtures::engine();
        let other = fixtures::other_engine();

        let token = other.issue_access(subject()).unwrap();
        assert_eq!(engine.verify(&token.token, &[]), Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn test_unsigned_token_is_malformed() {
        let engine = fixtures::engine();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"user_id":"00000000-0000-0000-0000-000000000000"}"#);
        let token = format!("{header}.{payload}.");

        assert!(matches!(
            engine.verify(&token, &[Expectation::access()]),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_hmac_token_is_malformed() {
        let engine = fixtures::engine();
        let claims = json!({
            "token_id": Uuid::new_v4(),
            "user_id": subject(),
            "scope": "access",
            "iat": Utc::now().timestamp(),
            "nbf": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret-that-is-at-least-32-characters-long"),
        )
        .unwrap();

        assert!(matches!(
            engine.verify(&token, &[]),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let engine = fixtures::engine();
        for token in ["", "invalid-token", "a.b", "a.b.c"] {
            assert!(
                matches!(engine.verify(token, &[]), Err(AuthError::MalformedToken(_))),
                "expected malformed for {token:?}"
            );
        }
    }

    #[test]
    fn test_undecodable_claims_are_malformed() {
        let engine = fixtures::engine();
        // Correctly signed, but no exp and an unknown scope.
        let token = sign_raw(
            &engine,
            &json!({"token_id": Uuid::new_v4(), "user_id": subject(), "scope": "admin"}),
        );

        assert!(matches!(
            engine.verify(&token, &[]),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_nil_ids_are_rejected() {
        let engine = fixtures::engine();
        let now = Utc::now().timestamp();

        let nil_user = sign_raw(
            &engine,
            &json!({
                "token_id": Uuid::new_v4(),
                "user_id": Uuid::nil(),
                "scope": "access",
                "iat": now, "nbf": now, "exp": now + 3600,
            }),
        );
        assert_eq!(
            engine.verify(&nil_user, &[Expectation::access()]),
            Err(AuthError::MissingClaim("user_id"))
        );

        let missing_token_id = sign_raw(
            &engine,
            &json!({
                "user_id": subject(),
                "scope": "access",
                "iat": now, "nbf": now, "exp": now + 3600,
            }),
        );
        assert_eq!(
            engine.verify(&missing_token_id, &[Expectation::access()]),
            Err(AuthError::MissingClaim("token_id"))
        );
    }

    #[test]
    fn test_future_token_is_not_yet_valid() {
        let engine = fixtures::engine();
        let now = Utc::now();
        let token = engine
            .issue_at(subject(), Scope::Access, Duration::hours(1), now + Duration::minutes(5))
            .unwrap();

        assert_eq!(
            engine.verify_at(&token.token, &[], now),
            Err(AuthError::TokenNotYetValid)
        );
    }

    #[test]
    fn test_leeway_tolerates_skew() {
        let settings = TokenSettings {
            leeway: Duration::seconds(120),
            ..TokenSettings::default()
        };
        let engine = fixtures::engine_with(settings);
        let now = Utc::now();
        let token = engine
            .issue_at(subject(), Scope::Access, Duration::minutes(1), now)
            .unwrap();

        assert!(engine
            .verify_at(&token.token, &[], now + Duration::seconds(90))
            .is_ok());
        assert_eq!(
            engine.verify_at(&token.token, &[], now + Duration::seconds(200)),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_header_is_rs256_jwt() {
        let engine = fixtures::engine();
        let token = engine.issue_access(subject()).unwrap();
        let header = jsonwebtoken::decode_header(&token.token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_refresh_issuance_is_a_stub() {
        let engine = fixtures::engine();
        assert!(matches!(
            engine.issue_refresh(subject()),
            Err(AuthError::Unsupported(_))
        ));
    }

    #[test]
    fn test_mismatched_key_pair_fails_construction() {
        let keys = KeyPair::from_pem(fixtures::RSA_PKCS1, fixtures::OTHER_SPKI).unwrap();
        let err = TokenEngine::new(keys, TokenSettings::default()).err().unwrap();
        assert!(matches!(err, AuthError::KeyFormat(msg) if msg.contains("does not match")));
    }
}
