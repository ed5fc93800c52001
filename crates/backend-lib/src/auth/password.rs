// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! New hashes are scrypt PHC strings whose `ln` parameter is the configured
//! work factor. Verification also accepts Argon2 hashes so accounts imported
//! from other tooling keep working until their next successful login
//! rehashes them.
use crate::error::AppError;
use argon2::Argon2;
use rand::RngCore;
use scrypt::{
    password_hash::{Ident, PasswordHash, PasswordHasher as _, SaltString},
    Params, Scrypt,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Default work factor: 2^12 scrypt iterations
pub const DEFAULT_COST: u8 = 12;

/// Lowest accepted work factor
pub const MIN_COST: u8 = 10;

/// Highest accepted work factor (memory use doubles with every step)
pub const MAX_COST: u8 = 20;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 10;

const SCRYPT_BLOCK_SIZE: u32 = 8;
const SCRYPT_PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 16;

/// Password complexity requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

/// Adaptive one-way password hasher
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u8,
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        // DEFAULT_COST is inside the accepted range
        Self::new(DEFAULT_COST).expect("default scrypt parameters are valid")
    }
}

impl PasswordHasher {
    /// Create a hasher with the given work factor
    pub fn new(cost: u8) -> Result<Self, AppError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(AppError::Configuration(format!(
                "hash cost must be between {MIN_COST} and {MAX_COST}, got {cost}"
            )));
        }
        let params = Params::new(cost, SCRYPT_BLOCK_SIZE, SCRYPT_PARALLELISM, OUTPUT_LEN)
            .map_err(|e| AppError::Configuration(format!("invalid scrypt parameters: {e}")))?;
        Ok(Self { cost, params })
    }

    pub fn cost(&self) -> u8 {
        self.cost
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, plain: &str) -> Result<String, AppError> {
        if plain.is_empty() {
            return Err(AppError::InvalidInput("password must not be empty".to_string()));
        }

        let mut salt_bytes = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;

        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
            .to_string();
        Ok(hash)
    }

    /// Verify a password against a stored hash
    ///
    /// Digest comparison is constant time. Malformed hashes never verify.
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        parsed_hash
            .verify_password(&[&Scrypt, &Argon2::default()], plain.as_bytes())
            .is_ok()
    }

    /// True when `hash` was not produced with this hasher's algorithm and cost
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };
        if parsed.algorithm != Ident::new_unwrap("scrypt") {
            return true;
        }
        parsed.params.get_decimal("ln") != Some(u32::from(self.cost))
    }

    /// Hash a password and zeroize the original
    pub fn hash_secure(&self, plain: &mut String) -> Result<String, AppError> {
        let hash = self.hash(plain);
        plain.zeroize();
        hash
    }
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(char::is_uppercase) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(char::is_lowercase) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}
