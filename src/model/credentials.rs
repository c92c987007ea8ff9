//! Password hashing and reset token primitives.

use argon2::Config as Argon2Config;
use data_encoding::HEXLOWER;
use rand::Rng;
use sha2::{Digest, Sha256};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Bytes of entropy in a reset token.
pub const RESET_TOKEN_BYTES: usize = 32;

/// Does this password meet the minimum length?
pub fn is_strong_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Hash a password with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())
}

/// Check a password against a stored Argon2 hash. A malformed hash never verifies.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match argon2::verify_encoded(password_hash, password.as_bytes()) {
        Ok(valid) => valid,
        Err(e) => {
            error!("Stored password hash could not be parsed: {e}");
            false
        }
    }
}

/// A freshly generated reset token, in the form emailed to the voter.
/// Never stored; only its [`hash_reset_token`] is.
pub struct RawResetToken(String);

impl RawResetToken {
    pub fn generate() -> Self {
        let mut bytes = [0_u8; RESET_TOKEN_BYTES];
        rand::thread_rng().fill(&mut bytes);
        Self(HEXLOWER.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> String {
        hash_reset_token(&self.0)
    }
}

/// Lower-case hex SHA-256 of a raw reset token.
pub fn hash_reset_token(raw_token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(raw_token.as_bytes()))
}
