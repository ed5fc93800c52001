use crate::error::AppError;
use crate::identity::Principal;
use async_trait::async_trait;
use std::net::IpAddr;

use super::Session;

/// A live session together with the principal it resolves to
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub session: Session,
    pub principal: Principal,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Verify credentials and open a session, superseding any previous one.
    ///
    /// Every failure other than an internal error is `InvalidCredentials` or
    /// `AuthRateLimited`; callers report both identically.
    async fn login(
        &self,
        username: &str,
        password: &str,
        client: IpAddr,
    ) -> Result<AuthenticatedSession, AppError>;

    /// Resolve a session id against both the session store and the current account state
    async fn resolve(&self, session_id: &str) -> Result<AuthenticatedSession, AppError>;

    /// End a session. Unknown ids are ignored.
    async fn logout(&self, session_id: &str);

    /// Replace the password of the session's identity and rotate its session
    async fn change_password(
        &self,
        session_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthenticatedSession, AppError>;
}
