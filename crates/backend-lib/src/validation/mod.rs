// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Field validation for identities and credential input.

use crate::error::AppError;
use regex::Regex;
use scrypt::password_hash::PasswordHash;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_ROLE_LENGTH: usize = 50;

// Regex patterns for validation
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s\p{Cc}]+$").expect("username pattern compiles"));
static ROLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("role pattern compiles"));

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid password hash: {0}")]
    InvalidPasswordHash(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Validate a login name
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username must not contain whitespace or control characters".to_string(),
        ));
    }

    Ok(username)
}

/// Validate the size of a submitted plaintext password
///
/// Strength rules live in `auth::password`; this only bounds the input the hasher sees.
pub fn validate_password_input(password: &str) -> ValidationResult<&str> {
    if password.is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password must not be empty".to_string(),
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(password)
}

/// Validate that a stored credential is a PHC hash and not a plaintext password
pub fn validate_password_hash(hash: &str) -> ValidationResult<&str> {
    PasswordHash::new(hash)
        .map(|_| hash)
        .map_err(|e| ValidationError::InvalidPasswordHash(e.to_string()))
}

/// Validate a role label such as `ROLE_ADMIN`
pub fn validate_role(role: &str) -> ValidationResult<&str> {
    if role.is_empty() || role.len() > MAX_ROLE_LENGTH {
        return Err(ValidationError::InvalidRole(format!(
            "Role must be between 1 and {MAX_ROLE_LENGTH} characters"
        )));
    }

    if !ROLE_REGEX.is_match(role) {
        return Err(ValidationError::InvalidRole(format!(
            "Role '{role}' must be upper case letters, digits and underscores"
        )));
    }

    Ok(role)
}
