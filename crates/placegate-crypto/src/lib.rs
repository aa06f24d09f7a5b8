/// Credential hashing primitives.
///
/// Passwords are stored as SHA-256(salt ‖ password) with a per-user random
/// 32-byte salt, both base64-encoded. Single-round SHA-256 matches the
/// deployed user store; moving to a slow hash (argon2) would invalidate
/// every existing row, so it has to ride a re-registration migration.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Digest a password with the given salt: SHA-256 over salt then password.
pub fn hash_password(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Base64-encode salt or digest bytes for storage.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a stored base64 salt or digest.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .context("invalid base64 in stored credential")
}

/// Compare a stored encoded digest against a freshly computed one.
///
/// The candidate digest is always encoded before comparison and the
/// comparison itself never exits early, so verification cost does not
/// depend on where the encodings diverge.
pub fn verify_encoded(stored: &str, computed: &[u8]) -> bool {
    let fresh = encode(computed);
    constant_time_eq(stored.as_bytes(), fresh.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
