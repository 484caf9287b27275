// ============================
// crates/backend-lib/src/storage/memory.rs
// ============================
//! In-memory storage for development runs and tests.
//!
//! A single mutex guards all tables, so each call is atomic the same way a
//! single-statement transaction is in Postgres.
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use toolroom_common::{AccountId, InstrumentId, StorageLocationId};
use uuid::Uuid;

use super::{instrument_not_found, location_not_found, AccountStore, CatalogStore, TelemetryStore};
use crate::error::AppError;
use crate::models::{Account, CookieAudit, Instrument, InstrumentFields, NewAccount, StorageLocation};

/// Newest audit rows kept; older ones are dropped first
pub const MAX_AUDIT_ROWS: usize = 10_000;

#[derive(Debug, Clone)]
struct InstrumentRecord {
    name: String,
    description: String,
    photo: Option<Vec<u8>>,
    storage_location_id: Option<StorageLocationId>,
    user_id: AccountId,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    instruments: BTreeMap<InstrumentId, InstrumentRecord>,
    locations: BTreeMap<StorageLocationId, String>,
    cookies: VecDeque<CookieAudit>,
    next_instrument_id: InstrumentId,
    next_location_id: StorageLocationId,
}

impl Tables {
    fn account_with_token_mut(&mut self, token: &str) -> Option<&mut Account> {
        self.accounts
            .values_mut()
            .find(|account| account.confirmation_token.as_deref() == Some(token))
    }

    fn check_location(&self, id: Option<StorageLocationId>) -> Result<(), AppError> {
        match id {
            Some(id) if !self.locations.contains_key(&id) => {
                Err(AppError::InvalidInput("Unknown storage location".to_string()))
            },
            _ => Ok(()),
        }
    }

    fn joined(&self, id: InstrumentId, record: &InstrumentRecord) -> Instrument {
        Instrument {
            id,
            name: record.name.clone(),
            description: record.description.clone(),
            photo: record.photo.clone(),
            storage_location_id: record.storage_location_id,
            storage_location: record
                .storage_location_id
                .and_then(|location| self.locations.get(&location).cloned()),
            user_id: record.user_id,
        }
    }
}

/// Storage that lives and dies with the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent audit rows, oldest first
    pub fn recorded_cookies(&self) -> Vec<CookieAudit> {
        self.tables.lock().cookies.iter().cloned().collect()
    }
}

#[async_trait]
impl AccountStore for MemoryStorage {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut tables = self.tables.lock();
        if tables.accounts.values().any(|existing| existing.email == account.email) {
            return Err(AppError::DuplicateEmail);
        }

        let row = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            confirmed: false,
            confirmation_token: Some(account.confirmation_token),
            created_at: Utc::now(),
        };
        tables.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, AppError> {
        Ok(self.tables.lock().accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let tables = self.tables.lock();
        Ok(tables.accounts.values().find(|account| account.email == email).cloned())
    }

    async fn find_account_by_token(&self, token: &str) -> Result<Option<Account>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .accounts
            .values()
            .find(|account| account.confirmation_token.as_deref() == Some(token))
            .cloned())
    }

    async fn confirm_account(&self, token: &str) -> Result<Option<Account>, AppError> {
        let mut tables = self.tables.lock();
        Ok(tables.account_with_token_mut(token).map(|account| {
            account.confirmed = true;
            account.confirmation_token = None;
            account.clone()
        }))
    }

    async fn replace_token(&self, email: &str, token: &str) -> Result<Option<Account>, AppError> {
        let mut tables = self.tables.lock();
        Ok(tables
            .accounts
            .values_mut()
            .find(|account| account.email == email)
            .map(|account| {
                account.confirmation_token = Some(token.to_string());
                account.clone()
            }))
    }

    async fn reset_password(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, AppError> {
        let mut tables = self.tables.lock();
        Ok(tables.account_with_token_mut(token).map(|account| {
            account.password_hash = password_hash.to_string();
            account.confirmation_token = None;
            account.clone()
        }))
    }
}

#[async_trait]
impl CatalogStore for MemoryStorage {
    async fn list_instruments(&self, owner: AccountId) -> Result<Vec<Instrument>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .instruments
            .iter()
            .filter(|(_, record)| record.user_id == owner)
            .map(|(id, record)| tables.joined(*id, record))
            .collect())
    }

    async fn get_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
    ) -> Result<Instrument, AppError> {
        let tables = self.tables.lock();
        tables
            .instruments
            .get(&id)
            .filter(|record| record.user_id == owner)
            .map(|record| tables.joined(id, record))
            .ok_or_else(|| instrument_not_found(id))
    }

    async fn create_instrument(
        &self,
        fields: InstrumentFields,
        owner: AccountId,
    ) -> Result<Instrument, AppError> {
        let mut tables = self.tables.lock();
        tables.check_location(fields.storage_location_id)?;

        tables.next_instrument_id += 1;
        let id = tables.next_instrument_id;
        let record = InstrumentRecord {
            name: fields.name,
            description: fields.description,
            photo: fields.photo,
            storage_location_id: fields.storage_location_id,
            user_id: owner,
        };
        let row = tables.joined(id, &record);
        tables.instruments.insert(id, record);
        Ok(row)
    }

    async fn update_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
        fields: InstrumentFields,
    ) -> Result<Instrument, AppError> {
        let mut tables = self.tables.lock();
        tables.check_location(fields.storage_location_id)?;

        let record = tables
            .instruments
            .get_mut(&id)
            .filter(|record| record.user_id == owner)
            .ok_or_else(|| instrument_not_found(id))?;
        record.name = fields.name;
        record.description = fields.description;
        record.storage_location_id = fields.storage_location_id;
        if let Some(photo) = fields.photo {
            record.photo = Some(photo);
        }

        let record = record.clone();
        Ok(tables.joined(id, &record))
    }

    async fn delete_instrument(&self, id: InstrumentId, owner: AccountId) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        match tables.instruments.get(&id) {
            Some(record) if record.user_id == owner => {
                tables.instruments.remove(&id);
                Ok(())
            },
            _ => Err(instrument_not_found(id)),
        }
    }

    async fn list_storage_locations(&self) -> Result<Vec<StorageLocation>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .locations
            .iter()
            .map(|(id, name)| StorageLocation {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn create_storage_location(&self, name: &str) -> Result<StorageLocation, AppError> {
        let mut tables = self.tables.lock();
        tables.next_location_id += 1;
        let id = tables.next_location_id;
        tables.locations.insert(id, name.to_string());
        Ok(StorageLocation {
            id,
            name: name.to_string(),
        })
    }

    async fn update_storage_location(
        &self,
        id: StorageLocationId,
        name: &str,
    ) -> Result<StorageLocation, AppError> {
        let mut tables = self.tables.lock();
        let stored = tables.locations.get_mut(&id).ok_or_else(|| location_not_found(id))?;
        *stored = name.to_string();
        Ok(StorageLocation {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_storage_location(&self, id: StorageLocationId) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        if tables.locations.remove(&id).is_none() {
            return Err(location_not_found(id));
        }
        for record in tables.instruments.values_mut() {
            if record.storage_location_id == Some(id) {
                record.storage_location_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for MemoryStorage {
    async fn record_cookies(&self, rows: Vec<CookieAudit>) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        tables.cookies.extend(rows);
        let excess = tables.cookies.len().saturating_sub(MAX_AUDIT_ROWS);
        tables.cookies.drain(..excess);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(email: &str, token: &str) -> NewAccount {
        NewAccount {
            username: "alice".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            confirmation_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let storage = MemoryStorage::new();
        storage.insert_account(new_account("a@x.com", "t1")).await.unwrap();

        let err = storage
            .insert_account(new_account("a@x.com", "t2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_confirm_consumes_token() {
        let storage = MemoryStorage::new();
        storage.insert_account(new_account("a@x.com", "t1")).await.unwrap();

        let confirmed = storage.confirm_account("t1").await.unwrap().unwrap();
        assert!(confirmed.confirmed);
        assert!(confirmed.confirmation_token.is_none());

        assert!(storage.confirm_account("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_photo_when_absent() {
        let storage = MemoryStorage::new();
        let owner = Uuid::new_v4();
        let created = storage
            .create_instrument(
                InstrumentFields {
                    name: "Saw".to_string(),
                    description: "hand saw".to_string(),
                    storage_location_id: None,
                    photo: Some(vec![1, 2, 3]),
                },
                owner,
            )
            .await
            .unwrap();

        let updated = storage
            .update_instrument(
                created.id,
                owner,
                InstrumentFields {
                    name: "Saw".to_string(),
                    description: "rip saw".to_string(),
                    storage_location_id: None,
                    photo: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "rip saw");
        assert_eq!(updated.photo, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_instruments_are_scoped_to_owner() {
        let storage = MemoryStorage::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let created = storage
            .create_instrument(
                InstrumentFields {
                    name: "Level".to_string(),
                    ..InstrumentFields::default()
                },
                owner,
            )
            .await
            .unwrap();

        assert!(storage.list_instruments(stranger).await.unwrap().is_empty());
        assert!(matches!(
            storage.get_instrument(created.id, stranger).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete_instrument(created.id, stranger).await,
            Err(AppError::NotFound(_))
        ));
        storage.delete_instrument(created.id, owner).await.unwrap();
        assert!(storage.list_instruments(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_location_detaches_instruments() {
        let storage = MemoryStorage::new();
        let owner = Uuid::new_v4();
        let shelf = storage.create_storage_location("Shelf A").await.unwrap();
        let created = storage
            .create_instrument(
                InstrumentFields {
                    name: "Hammer".to_string(),
                    storage_location_id: Some(shelf.id),
                    ..InstrumentFields::default()
                },
                owner,
            )
            .await
            .unwrap();
        assert_eq!(created.storage_location.as_deref(), Some("Shelf A"));

        storage.delete_storage_location(shelf.id).await.unwrap();
        let reloaded = storage.get_instrument(created.id, owner).await.unwrap();
        assert!(reloaded.storage_location_id.is_none());
        assert!(reloaded.storage_location.is_none());

        assert!(matches!(
            storage.delete_storage_location(shelf.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_location_rejected() {
        let storage = MemoryStorage::new();
        let err = storage
            .create_instrument(
                InstrumentFields {
                    name: "Clamp".to_string(),
                    storage_location_id: Some(42),
                    ..InstrumentFields::default()
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_audit_rows_are_capped() {
        let storage = MemoryStorage::new();
        let account_id = Uuid::new_v4();
        let rows: Vec<_> = (0..MAX_AUDIT_ROWS + 3)
            .map(|i| CookieAudit {
                account_id,
                cookie_name: "toolroom_session".to_string(),
                cookie_value: i.to_string(),
                ip_address: None,
                user_agent: None,
                device: "Other".to_string(),
                country: None,
                recorded_at: Utc::now(),
            })
            .collect();
        storage.record_cookies(rows).await.unwrap();

        let kept = storage.recorded_cookies();
        assert_eq!(kept.len(), MAX_AUDIT_ROWS);
        assert_eq!(kept[0].cookie_value, "3");
    }
}
