// ============================
// toolroom-backend-lib/src/storage.rs
// ============================
//! Storage abstraction with Postgres and in-memory implementations.
//!
//! Every mutating operation is one statement in its own transaction; no
//! implementation holds a transaction or connection between calls.
use async_trait::async_trait;
use toolroom_common::{AccountId, InstrumentId, StorageLocationId};

use crate::error::AppError;
use crate::models::{Account, CookieAudit, Instrument, InstrumentFields, NewAccount, StorageLocation};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Account persistence used by the credential store
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an unconfirmed account.
    ///
    /// Fails with [`AppError::DuplicateEmail`] when the email is taken. The
    /// check is the uniqueness constraint itself, never a prior lookup.
    async fn insert_account(&self, account: NewAccount) -> Result<Account, AppError>;

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, AppError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    /// Exact-match token lookup without consuming the token
    async fn find_account_by_token(&self, token: &str) -> Result<Option<Account>, AppError>;

    /// Mark the account holding `token` confirmed and clear the token, atomically
    async fn confirm_account(&self, token: &str) -> Result<Option<Account>, AppError>;

    /// Overwrite the pending token of the account with `email`
    async fn replace_token(&self, email: &str, token: &str) -> Result<Option<Account>, AppError>;

    /// Store a new password hash for the account holding `token` and clear the token, atomically
    async fn reset_password(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, AppError>;
}

/// Instrument and storage location persistence
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_instruments(&self, owner: AccountId) -> Result<Vec<Instrument>, AppError>;

    async fn get_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
    ) -> Result<Instrument, AppError>;

    async fn create_instrument(
        &self,
        fields: InstrumentFields,
        owner: AccountId,
    ) -> Result<Instrument, AppError>;

    /// Update an instrument; `fields.photo == None` keeps the stored photo
    async fn update_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
        fields: InstrumentFields,
    ) -> Result<Instrument, AppError>;

    async fn delete_instrument(&self, id: InstrumentId, owner: AccountId) -> Result<(), AppError>;

    async fn list_storage_locations(&self) -> Result<Vec<StorageLocation>, AppError>;

    async fn create_storage_location(&self, name: &str) -> Result<StorageLocation, AppError>;

    async fn update_storage_location(
        &self,
        id: StorageLocationId,
        name: &str,
    ) -> Result<StorageLocation, AppError>;

    /// Delete a location; instruments stored there lose their location
    async fn delete_storage_location(&self, id: StorageLocationId) -> Result<(), AppError>;
}

/// Audit log of cookies seen on authenticated requests
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn record_cookies(&self, rows: Vec<CookieAudit>) -> Result<(), AppError>;
}

/// Everything the server needs from a backend
pub trait Storage: AccountStore + CatalogStore + TelemetryStore + Clone + 'static {}

impl<T> Storage for T where T: AccountStore + CatalogStore + TelemetryStore + Clone + 'static {}

pub(crate) fn instrument_not_found(id: InstrumentId) -> AppError {
    AppError::NotFound(format!("instrument {id}"))
}

pub(crate) fn location_not_found(id: StorageLocationId) -> AppError {
    AppError::NotFound(format!("storage location {id}"))
}
