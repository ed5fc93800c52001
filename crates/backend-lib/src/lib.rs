// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Security core of the recipe catalog: credentials, sessions, CSRF
//! defense and route-level access control.

pub mod auth;
pub mod config;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod policy;
pub mod router;
pub mod storage;
pub mod validation;

use crate::auth::{
    AuthRateLimiter, AuthService, Clock, DefaultAuth, InMemorySessionStore, PasswordHasher,
    SessionManager, SystemClock,
};
use crate::config::Settings;
use crate::cookies::CookieConfig;
use crate::error::AppError;
use crate::middleware::SecurityHeaders;
use crate::policy::RoutePolicy;
use crate::storage::{CredentialStore, FlatFileStorage};
use std::sync::Arc;

pub use router::{create_router, create_router_with};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session manager
    pub sessions: Arc<SessionManager>,
    /// Credential storage backend
    pub store: Arc<dyn CredentialStore>,
    /// Validated settings
    pub settings: Arc<Settings>,
    /// Compiled route table
    pub policy: Arc<RoutePolicy>,
    pub security_headers: Arc<SecurityHeaders>,
    pub cookies: CookieConfig,
    /// Login lockout tracker
    pub rate_limiter: Arc<AuthRateLimiter>,
}

impl AppState {
    /// Create a new application state on the wall clock
    pub fn new(store: Arc<dyn CredentialStore>, settings: Settings) -> Result<Self, AppError> {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    /// Create a new application state with an explicit session clock
    pub fn with_clock(
        store: Arc<dyn CredentialStore>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        settings.validate()?;

        let sessions = Arc::new(SessionManager::with_parts(
            Arc::new(InMemorySessionStore::new()),
            clock,
            settings.absolute_timeout(),
            settings.idle_timeout(),
        ));
        let rate_limiter = Arc::new(AuthRateLimiter::new(
            settings.rate_limit.max_attempts,
            settings.lockout_duration(),
        ));
        let hasher = PasswordHasher::new(settings.hashing.cost)?;
        let auth = Arc::new(DefaultAuth::new(
            store.clone(),
            sessions.clone(),
            hasher,
            rate_limiter.clone(),
            settings.password_policy.clone(),
        )?);

        Ok(Self {
            auth,
            sessions,
            store,
            policy: Arc::new(settings.route_policy()?),
            security_headers: Arc::new(SecurityHeaders::from_settings(&settings)?),
            cookies: CookieConfig::from_settings(&settings),
            settings: Arc::new(settings),
            rate_limiter,
        })
    }

    /// Create a new application state over the flat-file store in the configured data directory
    pub fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let store = Arc::new(FlatFileStorage::new(&settings.storage.data_dir)?);
        Self::new(store, settings)
    }
}
