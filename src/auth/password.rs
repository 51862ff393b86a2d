//! PBKDF2-SHA256 password hashing.
//!
//! Stored format: `pbkdf2:<iterations>:<hex salt>:<hex hash>`. The iteration
//! count travels with the hash so the configured rounds can change without
//! invalidating existing accounts.
//!
//! Accounts carried over from older databases may still hold bcrypt hashes
//! (`$2a$`, `$2b$`, `$2y$`). Those verify through the `bcrypt` crate; new
//! hashes are always PBKDF2.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::AuthError;

const SCHEME: &str = "pbkdf2";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    format!(
        "{}:{}:{}:{}",
        SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// Check `password` against a stored hash.
///
/// A malformed stored hash is an error rather than a mismatch so it shows up in
/// the logs.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    if BCRYPT_PREFIXES.iter().any(|prefix| stored.starts_with(prefix)) {
        return bcrypt::verify(password, stored).map_err(|_| AuthError::MalformedHash);
    }

    let mut parts = stored.split(':');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::MalformedHash);
    };

    let iterations: u32 = iterations.parse().map_err(|_| AuthError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| AuthError::MalformedHash)?;
    let expected = hex::decode(expected).map_err(|_| AuthError::MalformedHash)?;
    if iterations == 0 || expected.is_empty() {
        return Err(AuthError::MalformedHash);
    }

    let mut actual = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);
    Ok(constant_time_eq(&actual, &expected))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
