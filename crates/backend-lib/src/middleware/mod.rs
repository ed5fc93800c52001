// crates/backend-lib/src/middleware/mod.rs

//! Request-defense middleware, outermost first: response headers, session
//! resolution, CSRF enforcement, route policy.

pub mod access;
pub mod csrf;
pub mod headers;
pub mod session;

pub use access::{enforce_access, LOGIN_PATH};
pub use csrf::{csrf_protect, is_safe_method, CsrfToken};
pub use headers::{security_headers, SecurityHeaders};
pub use session::{resolve_session, SessionContext};
