// ============================
// crates/backend-lib/src/identity.rs
// ============================
//! Authenticatable accounts and the per-request principal derived from them.

use crate::validation::{self, ValidationResult};
use recipe_common::UserRecord;
use std::collections::BTreeSet;
use std::fmt;

/// An account as the security core sees it.
///
/// Fields are private so every mutation goes through a validating setter.
/// The login name never changes once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    username: String,
    password_hash: String,
    enabled: bool,
    roles: BTreeSet<String>,
}

impl Identity {
    /// Build an enabled identity, validating every field
    pub fn new<I, R>(username: &str, password_hash: &str, roles: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        validation::validate_username(username)?;
        validation::validate_password_hash(password_hash)?;
        let roles = collect_roles(roles)?;

        Ok(Self {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            enabled: true,
            roles,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Replace the stored hash. The previous hash is dropped.
    pub fn set_password_hash(&mut self, password_hash: &str) -> ValidationResult<()> {
        validation::validate_password_hash(password_hash)?;
        self.password_hash = password_hash.to_string();
        Ok(())
    }

    /// Replace the role set
    pub fn assign_roles<I, R>(&mut self, roles: I) -> ValidationResult<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        self.roles = collect_roles(roles)?;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Convert back to the storage shape, keeping optional profile fields
    pub fn to_record(&self, template: Option<&UserRecord>) -> UserRecord {
        UserRecord {
            username: self.username.clone(),
            password_hash: self.password_hash.clone(),
            enabled: self.enabled,
            roles: self.roles.iter().cloned().collect(),
            full_name: template.and_then(|t| t.full_name.clone()),
            email: template.and_then(|t| t.email.clone()),
        }
    }
}

fn collect_roles<I, R>(roles: I) -> ValidationResult<BTreeSet<String>>
where
    I: IntoIterator<Item = R>,
    R: AsRef<str>,
{
    roles
        .into_iter()
        .map(|role| validation::validate_role(role.as_ref()).map(str::to_string))
        .collect()
}

impl TryFrom<&UserRecord> for Identity {
    type Error = validation::ValidationError;

    fn try_from(record: &UserRecord) -> Result<Self, Self::Error> {
        let mut identity = Identity::new(&record.username, &record.password_hash, &record.roles)?;
        identity.enabled = record.enabled;
        Ok(identity)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("roles", &self.roles)
            .finish()
    }
}

/// The authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub roles: BTreeSet<String>,
    pub session_id: String,
}

impl Principal {
    pub fn from_identity(identity: &Identity, session_id: &str) -> Self {
        Self {
            username: identity.username().to_string(),
            roles: identity.roles().clone(),
            session_id: session_id.to_string(),
        }
    }

    /// True if the principal holds at least one of `roles`
    pub fn has_any_role(&self, roles: &BTreeSet<String>) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}
