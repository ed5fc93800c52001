// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are layered: built-in defaults, then the TOML file, then
//! `RECIPE_` environment variables (`__` separates nested keys, e.g.
//! `RECIPE_SESSION__IDLE_TIMEOUT_SECS`).
use crate::auth::password::{PasswordHasher, PasswordRequirements};
use crate::error::AppError;
use crate::policy::{PatternSet, RoutePolicy};
use crate::validation::MAX_PASSWORD_LENGTH;
use axum::http::HeaderName;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use recipe_common::RouteRule;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const ENV_PREFIX: &str = "RECIPE_";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub hashing: HashingSettings,
    pub csrf: CsrfSettings,
    pub headers: HeaderSettings,
    pub rate_limit: RateLimitSettings,
    pub password_policy: PasswordRequirements,
    /// Ordered route classification table. First match wins.
    pub routes: Vec<RouteRule>,
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// Take the client address from `X-Real-IP` / `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub idle_timeout_secs: u64,
    pub absolute_timeout_secs: u64,
    /// Add the `Secure` attribute to session and CSRF cookies
    pub secure_cookies: bool,
    /// How often the binary purges expired sessions
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    /// scrypt work factor (log2 of the iteration count)
    pub cost: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    pub cookie_name: String,
    pub header_name: String,
    pub form_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderSettings {
    /// Extra origin allowed for images in the content security policy
    pub image_host: String,
    /// Paths whose responses must not be cached
    pub sensitive_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Failed logins per client before lockout (0 disables the lockout)
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            session: SessionSettings::default(),
            hashing: HashingSettings::default(),
            csrf: CsrfSettings::default(),
            headers: HeaderSettings::default(),
            rate_limit: RateLimitSettings::default(),
            password_policy: PasswordRequirements::default(),
            routes: default_routes(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            trust_proxy_headers: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "SESSIONID".to_string(),
            idle_timeout_secs: 30 * 60,
            absolute_timeout_secs: 8 * 60 * 60,
            secure_cookies: false,
            purge_interval_secs: 60,
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            cost: crate::auth::password::DEFAULT_COST,
        }
    }
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            cookie_name: "XSRF-TOKEN".to_string(),
            header_name: "X-XSRF-TOKEN".to_string(),
            form_field: "_csrf".to_string(),
        }
    }
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            image_host: "https://images.unsplash.com".to_string(),
            sensitive_paths: ["/login", "/logout", "/recetas/detalle/**", "/account/**", "/me"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

/// The catalog's route table: browsing and search are public, recipe detail needs a login
pub fn default_routes() -> Vec<RouteRule> {
    let public = [
        "/",
        "/home",
        "/index",
        "/buscar",
        "/recetas/buscar",
        "/login",
        "/error",
        "/css/**",
        "/js/**",
        "/images/**",
        "/webjars/**",
        "/favicon.ico",
    ];

    public
        .into_iter()
        .map(RouteRule::public)
        .chain(std::iter::once(RouteRule::requires_auth("/recetas/detalle/**")))
        .collect()
}

impl Settings {
    /// Load settings from `config/default.toml` and the environment
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from a specific TOML file and the environment.
    /// A missing file leaves the defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every value that would otherwise fail at first use
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: String| Err(AppError::Configuration(msg));

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return invalid(format!("unknown log level '{}'", self.log_level));
        }

        let session = &self.session;
        if session.idle_timeout_secs == 0 || session.absolute_timeout_secs == 0 {
            return invalid("session timeouts must be positive".to_string());
        }
        if session.idle_timeout_secs > session.absolute_timeout_secs {
            return invalid("session idle timeout cannot exceed the absolute timeout".to_string());
        }
        if session.purge_interval_secs == 0 {
            return invalid("session purge interval must be positive".to_string());
        }

        validate_cookie_name(&session.cookie_name)?;
        validate_cookie_name(&self.csrf.cookie_name)?;
        if session.cookie_name == self.csrf.cookie_name {
            return invalid("session and CSRF cookies need distinct names".to_string());
        }
        HeaderName::from_bytes(self.csrf.header_name.as_bytes()).map_err(|_| {
            AppError::Configuration(format!("invalid CSRF header name '{}'", self.csrf.header_name))
        })?;
        if self.csrf.form_field.is_empty() {
            return invalid("CSRF form field name must not be empty".to_string());
        }

        PasswordHasher::new(self.hashing.cost)?;

        let policy = &self.password_policy;
        if policy.min_length < 8 || policy.min_length > MAX_PASSWORD_LENGTH {
            return invalid(format!(
                "password minimum length must be between 8 and {MAX_PASSWORD_LENGTH}"
            ));
        }

        if self.rate_limit.max_attempts > 0 && self.rate_limit.lockout_secs == 0 {
            return invalid("rate limit lockout must be positive when attempts are limited".to_string());
        }

        self.image_origin()?;
        self.route_policy()?;
        self.sensitive_paths()?;
        Ok(())
    }

    /// Compile the route table
    pub fn route_policy(&self) -> Result<RoutePolicy, AppError> {
        RoutePolicy::from_rules(&self.routes)
    }

    /// Compile the cache-sensitive path list
    pub fn sensitive_paths(&self) -> Result<PatternSet, AppError> {
        PatternSet::parse(&self.headers.sensitive_paths)
    }

    /// The image host reduced to its origin, ready for the content security policy
    pub fn image_origin(&self) -> Result<String, AppError> {
        let url = url::Url::parse(&self.headers.image_host).map_err(|e| {
            AppError::Configuration(format!("invalid image host '{}': {e}", self.headers.image_host))
        })?;
        if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
            return Err(AppError::Configuration(format!(
                "image host '{}' must be an http(s) origin",
                self.headers.image_host
            )));
        }
        Ok(url.origin().ascii_serialization())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session.idle_timeout_secs)
    }

    pub fn absolute_timeout(&self) -> Duration {
        Duration::from_secs(self.session.absolute_timeout_secs)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.rate_limit.lockout_secs)
    }
}

/// Cookie names are RFC 6265 tokens
fn validate_cookie_name(name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        });
    if valid {
        Ok(())
    } else {
        Err(AppError::Configuration(format!("invalid cookie name '{name}'")))
    }
}
