//! Shared types for Turnstile

pub mod error;

pub use error::{AuthError, PasswordPolicyError, Result, TurnstileError};
