//! Authentication primitives for the Path Warden API.
//!
//! Password hashing (Argon2id), HMAC-signed bearer tokens, and the
//! file-backed user store with registration validation.

pub mod password;
pub mod store;
pub mod token;

use thiserror::Error;

/// Authentication and authorization failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username: must match [A-Za-z0-9_.-]{{3,32}}")]
    InvalidUsername,

    #[error("weak password: {0}")]
    WeakPassword(String),

    #[error("username already taken")]
    UserExists,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Password(#[from] password::PasswordError),
}
