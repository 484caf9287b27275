// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request field validation.

use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
const MAX_USERNAME_LENGTH: usize = 64;
const MAX_NAME_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 4000;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid description: {0}")]
    InvalidDescription(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trim and lowercase an email so lookups and the unique index agree
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an already normalized email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email address cannot be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email address cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email address format".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a display name for a new account
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidUsername(
            "Username must not be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between 1 and {MAX_USERNAME_LENGTH} characters"
        )));
    }

    Ok(trimmed)
}

/// Validate an instrument or storage location name
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidName(
            "Name must not be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "Name must be between 1 and {MAX_NAME_LENGTH} characters"
        )));
    }

    Ok(trimmed)
}

pub fn validate_description(description: &str) -> ValidationResult<&str> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::InvalidDescription(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }

    Ok(description)
}
