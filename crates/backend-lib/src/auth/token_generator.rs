// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure token generation for authentication
This module provides cryptographically secure token generation
for session identifiers and CSRF tokens. */
use rand::RngCore;

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/** Generate a cryptographically secure random token
This uses the thread-local CSPRNG (seeded from OS entropy) to create
a token suitable for session IDs and CSRF tokens.
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Compare two tokens without short-circuiting on the first differing byte
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Shortened form of a token that is safe to put in logs
pub fn token_fingerprint(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
