// ============================
// toolroom-backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng}, Scrypt};
use zeroize::Zeroize;

pub use crate::config::PasswordRequirements;

/// Hash a password using scrypt, returning a PHC string with its own salt
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password(plain.as_bytes(), &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash.
///
/// The digest comparison inside `password_hash` is constant time. An
/// unparsable stored hash never verifies.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
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

/// Hash a password and zeroize the plaintext
pub fn hash_password_secure(mut plain: String) -> anyhow::Result<String> {
    let hash = hash_password(&plain);
    plain.zeroize();
    hash
}
