//! Credential Hasher
//!
//! Argon2id with a random per-password salt. The PHC output string embeds the
//! algorithm, parameters and salt, so verification needs nothing but the
//! stored hash.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("stored password hash is not a valid PHC string")]
    InvalidHash,

    #[error("password does not match")]
    Mismatch,
}

/// Hashes `plaintext` into a self-contained PHC string.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// Checks `plaintext` against a hash produced by [`hash_password`].
pub fn verify_password(plaintext: &str, hash: &str) -> Result<(), CredentialError> {
    let parsed = PasswordHash::new(hash).map_err(|_| CredentialError::InvalidHash)?;

    // Argon2 compares in constant time internally.
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .map_err(|_| CredentialError::Mismatch)
}
