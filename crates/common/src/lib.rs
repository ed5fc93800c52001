// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! shared between the recipe catalog's CRUD layer and its security core.
//! This module defines the user record format, the route classification
//! vocabulary and the form payloads the login endpoints accept.

use serde::{Deserialize, Serialize};

/// Role granted to every provisioned account unless told otherwise
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// Persisted shape of an account as the record storage keeps it
///
/// This is the raw record; the security core validates it into an
/// `Identity` before trusting any field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique login name
    pub username: String,
    /// PHC-formatted password hash, never plaintext
    pub password_hash: String,
    /// Soft-disable flag; disabled accounts cannot log in
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Role labels, e.g. `ROLE_ADMIN`
    #[serde(default)]
    pub roles: Vec<String>,
    /// Display name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Contact address (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// How a request path is treated by access control
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Reachable without a session
    Public,
    /// Needs a valid session
    RequiresAuth,
}

/// One entry of the route policy table as written in configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Path pattern, e.g. `/login` or `/css/**`
    pub pattern: String,
    /// Classification applied when the pattern matches
    pub access: Classification,
    /// Restrict the rule to these HTTP methods (all methods when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Roles of which the identity must hold at least one (`requires_auth` only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl RouteRule {
    /// Shorthand for a method-agnostic public rule
    pub fn public(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            access: Classification::Public,
            methods: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Shorthand for a method-agnostic authenticated rule
    pub fn requires_auth(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            access: Classification::RequiresAuth,
            methods: Vec::new(),
            roles: Vec::new(),
        }
    }
}

/// Login form submission. Missing fields arrive empty and simply fail to authenticate.
#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Password change form submission
#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
}

impl std::fmt::Debug for PasswordChangeForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChangeForm").finish_non_exhaustive()
    }
}
