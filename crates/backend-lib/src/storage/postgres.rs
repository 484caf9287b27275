// ============================
// crates/backend-lib/src/storage/postgres.rs
// ============================
//! Postgres storage backed by a connection pool.
use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use toolroom_common::{AccountId, InstrumentId, StorageLocationId};
use tracing::info;
use uuid::Uuid;

use super::{instrument_not_found, location_not_found, AccountStore, CatalogStore, TelemetryStore};
use crate::config::DatabaseSettings;
use crate::error::AppError;
use crate::models::{Account, CookieAudit, Instrument, InstrumentFields, NewAccount, StorageLocation};

const EMAIL_CONSTRAINT: &str = "users_email_key";

const SELECT_ACCOUNT: &str = r#"
    SELECT id, username, email, password_hash, confirmed, confirmation_token, created_at
    FROM users
"#;

const RETURNING_ACCOUNT: &str =
    "RETURNING id, username, email, password_hash, confirmed, confirmation_token, created_at";

/// Joins the location name onto the rows of the `picked` CTE
const SELECT_PICKED_INSTRUMENTS: &str = r#"
    SELECT picked.id, picked.name, picked.description, picked.photo, picked.storage_location_id,
           storage_locations.name AS storage_location, picked.user_id
    FROM picked
    LEFT JOIN storage_locations ON storage_locations.id = picked.storage_location_id
"#;

/// Postgres implementation of the storage traits
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl fmt::Debug for PgStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgStorage")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PgStorage {
    /// Wrap an existing pool; migrations are not applied
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized by `settings`
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let url = settings
            .url
            .as_deref()
            .context("database.url is not configured")?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect(url)
            .await
            .context("database connection failed")?;

        info!(
            max_connections = settings.max_connections,
            min_connections = settings.min_connections,
            "database pool initialized"
        );
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("database migration failed")?;
        Ok(())
    }
}

fn map_insert_account_error(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() && db_err.constraint() == Some(EMAIL_CONSTRAINT) {
            return AppError::DuplicateEmail;
        }
    }
    AppError::Database(err)
}

fn map_location_reference_error(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return AppError::InvalidInput("Unknown storage location".to_string());
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl AccountStore for PgStorage {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, confirmed, confirmation_token) \
             VALUES ($1, $2, $3, $4, FALSE, $5) {RETURNING_ACCOUNT}"
        );
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(Uuid::new_v4())
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.confirmation_token)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_insert_account_error)?;
        tx.commit().await?;
        Ok(row)
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, AppError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE id = $1");
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE email = $1");
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_account_by_token(&self, token: &str) -> Result<Option<Account>, AppError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE confirmation_token = $1");
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn confirm_account(&self, token: &str) -> Result<Option<Account>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE users SET confirmed = TRUE, confirmation_token = NULL \
             WHERE confirmation_token = $1 {RETURNING_ACCOUNT}"
        );
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn replace_token(&self, email: &str, token: &str) -> Result<Option<Account>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE users SET confirmation_token = $2 WHERE email = $1 {RETURNING_ACCOUNT}"
        );
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn reset_password(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE users SET password_hash = $2, confirmation_token = NULL \
             WHERE confirmation_token = $1 {RETURNING_ACCOUNT}"
        );
        let row = sqlx::query_as::<_, Account>(&sql)
            .bind(token)
            .bind(password_hash)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }
}

#[async_trait]
impl CatalogStore for PgStorage {
    async fn list_instruments(&self, owner: AccountId) -> Result<Vec<Instrument>, AppError> {
        let sql = format!(
            "WITH picked AS (SELECT * FROM instruments WHERE user_id = $1) \
             {SELECT_PICKED_INSTRUMENTS} ORDER BY picked.id"
        );
        let rows = sqlx::query_as::<_, Instrument>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
    ) -> Result<Instrument, AppError> {
        let sql = format!(
            "WITH picked AS (SELECT * FROM instruments WHERE id = $1 AND user_id = $2) \
             {SELECT_PICKED_INSTRUMENTS}"
        );
        sqlx::query_as::<_, Instrument>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| instrument_not_found(id))
    }

    async fn create_instrument(
        &self,
        fields: InstrumentFields,
        owner: AccountId,
    ) -> Result<Instrument, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "WITH picked AS ( \
                INSERT INTO instruments (name, description, photo, storage_location_id, user_id) \
                VALUES ($1, $2, $3, $4, $5) RETURNING * \
             ) {SELECT_PICKED_INSTRUMENTS}"
        );
        let row = sqlx::query_as::<_, Instrument>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.photo)
            .bind(fields.storage_location_id)
            .bind(owner)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_location_reference_error)?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
        fields: InstrumentFields,
    ) -> Result<Instrument, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "WITH picked AS ( \
                UPDATE instruments \
                SET name = $3, description = $4, photo = COALESCE($5, photo), \
                    storage_location_id = $6 \
                WHERE id = $1 AND user_id = $2 RETURNING * \
             ) {SELECT_PICKED_INSTRUMENTS}"
        );
        let row = sqlx::query_as::<_, Instrument>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.photo)
            .bind(fields.storage_location_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_location_reference_error)?;
        tx.commit().await?;
        row.ok_or_else(|| instrument_not_found(id))
    }

    async fn delete_instrument(&self, id: InstrumentId, owner: AccountId) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM instruments WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        if result.rows_affected() == 0 {
            return Err(instrument_not_found(id));
        }
        Ok(())
    }

    async fn list_storage_locations(&self) -> Result<Vec<StorageLocation>, AppError> {
        let rows = sqlx::query_as::<_, StorageLocation>(
            "SELECT id, name FROM storage_locations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_storage_location(&self, name: &str) -> Result<StorageLocation, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, StorageLocation>(
            "INSERT INTO storage_locations (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_storage_location(
        &self,
        id: StorageLocationId,
        name: &str,
    ) -> Result<StorageLocation, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, StorageLocation>(
            "UPDATE storage_locations SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.ok_or_else(|| location_not_found(id))
    }

    async fn delete_storage_location(&self, id: StorageLocationId) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM storage_locations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        if result.rows_affected() == 0 {
            return Err(location_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for PgStorage {
    async fn record_cookies(&self, rows: Vec<CookieAudit>) -> Result<(), AppError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO user_cookies \
             (user_id, cookie_name, cookie_value, ip_address, user_agent, device, country, recorded_at) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.account_id)
                .push_bind(row.cookie_name)
                .push_bind(row.cookie_value)
                .push_bind(row.ip_address)
                .push_bind(row.user_agent)
                .push_bind(row.device)
                .push_bind(row.country)
                .push_bind(row.recorded_at);
        });

        let mut tx = self.pool.begin().await?;
        builder.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
