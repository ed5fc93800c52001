// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod clock;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token_generator;
mod service;
mod service_impl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use password::{
    validate_password_strength, PasswordHasher, PasswordRequirements, DEFAULT_COST,
    MIN_PASSWORD_LENGTH,
};
pub use rate_limit::AuthRateLimiter;
pub use service::{AuthService, AuthenticatedSession};
pub use service_impl::DefaultAuth;
pub use session::{
    InMemorySessionStore, Session, SessionManager, SessionStore, SESSION_ABSOLUTE_TTL,
    SESSION_IDLE_TTL,
};
pub use token_generator::{generate_secure_token, tokens_match};
