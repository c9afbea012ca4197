//! Turnstile - trust core for account onboarding
//!
//! Turnstile holds the security primitives an onboarding backend is built on:
//!
//! - **Keys**: RSA key material loaded from PEM (PKCS#1, PKCS#8, SPKI)
//! - **Tokens**: RS256 session tokens with ordered, classified verification
//! - **Passwords**: Argon2id hashing with a self-describing encoded format
//! - **Gate**: deadline-bounded execution that always answers exactly once
//! - **Transport**: credential extraction from cookies and bearer headers

pub mod auth;
pub mod config;
pub mod gate;
pub mod logging;
pub mod state;
pub mod transport;
pub mod types;

pub use config::Args;
pub use gate::{DeadlineGate, DeadlinePolicy, GateResponse, RequestContext};
pub use state::TrustCore;
pub use types::{AuthError, Result, TurnstileError};
