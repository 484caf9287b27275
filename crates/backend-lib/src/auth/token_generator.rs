// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure token generation for authentication
This module provides cryptographically secure token generation
for session cookies and the single-use email tokens. */
use rand::RngCore;

/// Session token size in bytes (32 bytes = 256 bits of entropy)
const SESSION_TOKEN_BYTES: usize = 32;

/// Confirmation and password reset token size in bytes
pub const EMAIL_TOKEN_BYTES: usize = 16;

/** Generate a token for a login session
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_session_token() -> String {
    generate_secure_token_with_size(SESSION_TOKEN_BYTES)
}

/** Generate a token sent by email to confirm an address or reset a password.
The token travels in a URL path, hence the URL-safe alphabet. */
pub fn generate_email_token() -> String {
    generate_secure_token_with_size(EMAIL_TOKEN_BYTES)
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
