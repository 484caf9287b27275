// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `Toolroom` clients and the server.
//! This module defines the JSON request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque account identifier
pub type AccountId = Uuid;

/// Instrument identifier
pub type InstrumentId = i64;

/// Storage location identifier
pub type StorageLocationId = i64;

/// Body of `POST /register`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /login`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /reset-password`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetRequest {
    pub email: String,
}

/// Body of `POST /reset-password/{token}`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewPasswordRequest {
    pub password: String,
}

/// Body of storage location create/rename requests
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageLocationRequest {
    pub name: String,
}

/// Public view of an account. Never carries the password hash or token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
}

/// Generic acknowledgement
///
/// `warnings` carries non-fatal problems the user should see, for example
/// an email that could not be delivered.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ApiMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Response of `POST /login`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub account: AccountView,
}

/// Instrument as returned by the listing and edit endpoints
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstrumentView {
    pub id: InstrumentId,
    pub name: String,
    pub description: String,
    /// Base64 encoded JPEG, absent when no photo was uploaded
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub storage_location_id: Option<StorageLocationId>,
    /// Name of the storage location, resolved by the listing query
    #[serde(default)]
    pub storage_location: Option<String>,
}

/// Storage location
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StorageLocationView {
    pub id: StorageLocationId,
    pub name: String,
}

/// Error envelope produced by the server for every failed request
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Error code and human readable message
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
