// ================
// crates/backend-lib/src/models.rs
// ================
//! Records stored by the backend and their conversions to wire types.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use toolroom_common::{
    AccountId, AccountView, InstrumentId, InstrumentView, StorageLocationId, StorageLocationView,
};

/// Account row, decoded from named columns
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    /// Pending confirmation or password reset token
    pub confirmation_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            confirmed: self.confirmed,
        }
    }
}

/// Values for inserting a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmation_token: String,
}

/// Instrument row joined with the name of its storage location
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Instrument {
    pub id: InstrumentId,
    pub name: String,
    pub description: String,
    pub photo: Option<Vec<u8>>,
    pub storage_location_id: Option<StorageLocationId>,
    pub storage_location: Option<String>,
    pub user_id: AccountId,
}

impl Instrument {
    pub fn view(&self) -> InstrumentView {
        InstrumentView {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            photo: self.photo.as_ref().map(|bytes| STANDARD.encode(bytes)),
            storage_location_id: self.storage_location_id,
            storage_location: self.storage_location.clone(),
        }
    }
}

/// Editable instrument fields.
///
/// `photo: None` means "no new photo": inserts store no blob, updates keep the
/// stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentFields {
    pub name: String,
    pub description: String,
    pub storage_location_id: Option<StorageLocationId>,
    pub photo: Option<Vec<u8>>,
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub id: StorageLocationId,
    pub name: String,
}

impl StorageLocation {
    pub fn view(&self) -> StorageLocationView {
        StorageLocationView {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// One cookie seen on an authenticated request, with the request's client details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAudit {
    pub account_id: AccountId,
    pub cookie_name: String,
    pub cookie_value: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device: String,
    /// No geo lookup exists, always `None` for now
    pub country: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
