//! Password hashing utilities using Argon2.
//!
//! Argon2id in PHC string format for storage; complexity validation for
//! the registration endpoint.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// Password hashing errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Error during password hashing.
    #[error("failed to hash password: {0}")]
    HashError(String),

    /// Error during password verification.
    #[error("failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format.
    #[error("invalid password hash format")]
    InvalidHash,
}

/// Hashes a password using Argon2id, returning a PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Verifies a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Checks that a password meets the registration requirements:
/// at least 8 characters with an uppercase letter, a lowercase letter, a
/// digit, and a special character.
///
/// Returns the list of violated requirements, empty if valid.
pub fn validate_password_strength(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if password.len() < 8 {
        errors.push("password must be at least 8 characters long");
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push("password must contain at least one lowercase letter");
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push("password must contain at least one uppercase letter");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password must contain at least one digit");
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        errors.push("password must contain at least one special character");
    }

    errors
}
