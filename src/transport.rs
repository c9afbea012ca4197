//! Credential transport
//!
//! Session tokens travel either in the `access_token` cookie or in an
//! `Authorization: Bearer <token>` header. The cookie wins when it is present
//! and non-empty.

use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, AUTHORIZATION, COOKIE};
use tracing::debug;

use crate::auth::{Claims, Expectation, SignedToken, TokenEngine, BEARER_SCHEME};
use crate::types::AuthError;

/// Cookie holding the access token
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Find the session credential in request headers.
pub fn extract_credential(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(token) = cookie_value(headers, ACCESS_TOKEN_COOKIE) {
        return Ok(token);
    }

    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or(AuthError::CredentialNotFound)?;

    parse_bearer(header)
}

/// Split an `Authorization` value into scheme and token.
pub fn parse_bearer(header: &str) -> Result<String, AuthError> {
    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(AuthError::MalformedAuthorization);
    }

    let scheme = fields[0].to_ascii_lowercase();
    if scheme != BEARER_SCHEME {
        return Err(AuthError::UnsupportedScheme(scheme));
    }

    Ok(fields[1].to_string())
}

/// Extract the credential and verify it as an access token.
pub fn authenticate(engine: &TokenEngine, headers: &HeaderMap) -> Result<Claims, AuthError> {
    let token = extract_credential(headers)?;
    engine.verify(&token, &[Expectation::access()]).map_err(|e| {
        debug!(error = %e, "session credential rejected");
        e
    })
}

/// `Set-Cookie` value storing `token`, or clearing the cookie when `None`.
pub fn session_cookie(token: Option<&SignedToken>, now: DateTime<Utc>) -> String {
    let (value, max_age) = match token {
        Some(t) => (t.token.as_str(), t.max_age(now)),
        None => ("", -1),
    };

    format!(
        "{ACCESS_TOKEN_COOKIE}={value}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={max_age}"
    )
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
