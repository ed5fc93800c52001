use crate::auth::{
    validate_password_strength, AuthRateLimiter, AuthService, AuthenticatedSession,
    PasswordHasher, PasswordRequirements, SessionManager,
};
use crate::error::AppError;
use crate::identity::{Identity, Principal};
use crate::metrics::{
    LOGIN_FAILED, LOGIN_RATE_LIMITED, LOGIN_SUCCEEDED, PASSWORD_CHANGED, PASSWORD_REHASHED,
};
use crate::storage::CredentialStore;
use crate::validation;
use async_trait::async_trait;
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// Hashed and verified in place of a missing account so lookups cost the same
const DUMMY_PASSWORD: &str = "dummy-password-for-timing";

pub struct DefaultAuth {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<SessionManager>,
    hasher: PasswordHasher,
    rate_limiter: Arc<AuthRateLimiter>,
    requirements: PasswordRequirements,
    dummy_hash: String,
}

impl DefaultAuth {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: Arc<SessionManager>,
        hasher: PasswordHasher,
        rate_limiter: Arc<AuthRateLimiter>,
        requirements: PasswordRequirements,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            sessions,
            hasher,
            rate_limiter,
            requirements,
            dummy_hash,
        })
    }

    /// Run a verification on the blocking pool
    async fn verify(&self, plain: &str, hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let plain = Zeroizing::new(plain.to_string());
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash)).await?;
        Ok(verified)
    }

    /// Run a hash on the blocking pool
    async fn hash(&self, plain: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let plain = Zeroizing::new(plain.to_string());
        tokio::task::spawn_blocking(move || hasher.hash(&plain)).await?
    }

    /// Upgrade a stored hash after a successful login. Failure only costs the upgrade.
    async fn rehash_if_needed(&self, identity: &Identity, plain: &str) {
        if !self.hasher.needs_rehash(identity.password_hash()) {
            return;
        }

        let result = match self.hash(plain).await {
            Ok(hash) => self.store.update_password(identity.username(), &hash).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                counter!(PASSWORD_REHASHED).increment(1);
                info!(username = identity.username(), cost = self.hasher.cost(), "password hash upgraded");
            },
            Err(e) => warn!(username = identity.username(), error = %e, "password rehash failed"),
        }
    }

    async fn open_session(&self, identity: &Identity) -> Result<AuthenticatedSession, AppError> {
        let session = self.sessions.create(identity).await?;
        let principal = Principal::from_identity(identity, &session.id);
        Ok(AuthenticatedSession { session, principal })
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    #[instrument(skip(self, password))]
    async fn login(
        &self,
        username: &str,
        password: &str,
        client: IpAddr,
    ) -> Result<AuthenticatedSession, AppError> {
        if !self.rate_limiter.check_rate_limit(client) {
            counter!(LOGIN_RATE_LIMITED).increment(1);
            warn!("login attempt from locked-out client");
            return Err(AppError::AuthRateLimited);
        }

        let candidate = self
            .store
            .find_by_username(username)
            .await?
            .filter(Identity::enabled);

        // Unknown and disabled accounts still pay for one verification
        let hash = candidate
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |i| i.password_hash().to_string());
        let verified = self.verify(password, hash).await?;

        let identity = match candidate {
            Some(identity) if verified => identity,
            _ => {
                self.rate_limiter.record_failed_attempt(client);
                counter!(LOGIN_FAILED).increment(1);
                info!("login failed");
                return Err(AppError::InvalidCredentials);
            },
        };

        self.rate_limiter.record_success(client);
        self.rehash_if_needed(&identity, password).await;

        let authenticated = self.open_session(&identity).await?;
        counter!(LOGIN_SUCCEEDED).increment(1);
        info!("login succeeded");
        Ok(authenticated)
    }

    async fn resolve(&self, session_id: &str) -> Result<AuthenticatedSession, AppError> {
        let session = self.sessions.validate(session_id).await?;

        match self.store.find_by_username(&session.username).await? {
            Some(identity) if identity.enabled() => Ok(AuthenticatedSession {
                principal: Principal::from_identity(&identity, &session.id),
                session,
            }),
            _ => {
                debug!(username = %session.username, "account gone or disabled, ending its session");
                self.sessions.invalidate(&session.id).await;
                Err(AppError::SessionInvalid)
            },
        }
    }

    async fn logout(&self, session_id: &str) {
        self.sessions.invalidate(session_id).await;
    }

    #[instrument(skip_all)]
    async fn change_password(
        &self,
        session_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthenticatedSession, AppError> {
        let AuthenticatedSession { session, .. } = self.resolve(session_id).await?;
        let mut identity = self
            .store
            .find_by_username(&session.username)
            .await?
            .ok_or(AppError::SessionInvalid)?;

        if !self.verify(current_password, identity.password_hash().to_string()).await? {
            counter!(LOGIN_FAILED).increment(1);
            info!(username = identity.username(), "password change rejected: current password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        validation::validate_password_input(new_password)?;
        if !validate_password_strength(new_password, &self.requirements) {
            return Err(AppError::InvalidInput(
                "new password does not meet the password requirements".to_string(),
            ));
        }

        let hash = self.hash(new_password).await?;
        self.store.update_password(identity.username(), &hash).await?;
        identity.set_password_hash(&hash)?;

        let authenticated = self.open_session(&identity).await?;
        counter!(PASSWORD_CHANGED).increment(1);
        info!(username = identity.username(), "password changed");
        Ok(authenticated)
    }
}
