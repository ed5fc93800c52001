// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_SUPERSEDED: &str = "session.superseded";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_LOGGED_OUT: &str = "session.logged_out";
pub const SESSION_ACTIVE: &str = "session.active";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_RATE_LIMITED: &str = "login.rate_limited";
pub const PASSWORD_REHASHED: &str = "password.rehashed";
pub const PASSWORD_CHANGED: &str = "password.changed";
pub const CSRF_REJECTED: &str = "csrf.rejected";
pub const ACCESS_REDIRECTED: &str = "access.redirected";
pub const ACCESS_DENIED: &str = "access.denied";
