//! Password hashing and access tokens.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{issue_token, verify_token, Claims};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}
