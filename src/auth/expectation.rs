//! Caller-supplied policy checks run against verified claims
//!
//! Structural checks (signature, timing, ids) are the verifier's job. What a
//! particular endpoint additionally requires, such as the token scope, is
//! expressed as an ordered list of expectations; the first failure wins.

use std::fmt;
use std::sync::Arc;

use super::claims::{Claims, Scope};

type Predicate = dyn Fn(&Claims) -> Result<(), String> + Send + Sync;

/// A single policy check over parsed claims.
#[derive(Clone)]
pub enum Expectation {
    /// Token scope must equal the given scope
    Scope(Scope),
    /// Arbitrary predicate returning the failure reason
    Custom(Arc<Predicate>),
}

impl Expectation {
    /// Scope must be `access`
    pub fn access() -> Self {
        Self::Scope(Scope::Access)
    }

    /// Scope must be `refresh`. Defined for completeness; no route uses it yet.
    pub fn refresh() -> Self {
        Self::Scope(Scope::Refresh)
    }

    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Claims) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(check))
    }

    /// Run the check, returning the reason on failure.
    pub fn check(&self, claims: &Claims) -> Result<(), String> {
        match self {
            Self::Scope(expected) if claims.scope != *expected => Err(format!(
                "scope {} expected, token has {}",
                expected, claims.scope
            )),
            Self::Scope(_) => Ok(()),
            Self::Custom(check) => check(claims),
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope(scope) => f.debug_tuple("Scope").field(scope).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn claims(scope: Scope) -> Claims {
        Claims {
            token_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            scope,
            iat: 0,
            nbf: 0,
            exp: 60,
        }
    }

    #[test]
    fn test_scope_expectations() {
        assert!(Expectation::access().check(&claims(Scope::Access)).is_ok());
        assert!(Expectation::refresh().check(&claims(Scope::Refresh)).is_ok());

        let reason = Expectation::access()
            .check(&claims(Scope::Refresh))
            .unwrap_err();
        assert_eq!(reason, "scope access expected, token has refresh");
        assert!(Expectation::refresh().check(&claims(Scope::Access)).is_err());
    }

    #[test]
    fn test_custom_expectation() {
        let allowed = Uuid::new_v4();
        let only_allowed = Expectation::custom(move |c| {
            if c.user_id == allowed {
                Ok(())
            } else {
                Err("user is not allowed".into())
            }
        });

        let mut c = claims(Scope::Access);
        assert!(only_allowed.check(&c).is_err());
        c.user_id = allowed;
        assert!(only_allowed.check(&c).is_ok());
        assert_eq!(format!("{:?}", only_allowed), "Custom(..)");
    }
}
