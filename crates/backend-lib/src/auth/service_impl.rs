use async_trait::async_trait;
use metrics::counter;
use toolroom_common::AccountId;
use tracing::info;

use super::password::{hash_password_secure, validate_password_strength, verify_password};
use super::token_generator::generate_email_token;
use super::{AuthService, PasswordRequirements, Session, SessionManager};
use crate::error::{AppError, AuthFailure};
use crate::metrics::{ACCOUNT_REGISTERED, LOGIN_FAILED, LOGIN_SUCCEEDED};
use crate::models::{Account, NewAccount};
use crate::storage::AccountStore;
use crate::validation::{normalize_email, validate_email, validate_username};

pub struct DefaultAuth<S> {
    store: S,
    sm: SessionManager,
    requirements: PasswordRequirements,
}

impl<S: AccountStore> DefaultAuth<S> {
    pub fn new(store: S, sm: SessionManager, requirements: PasswordRequirements) -> Self {
        Self {
            store,
            sm,
            requirements,
        }
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AppError> {
        if validate_password_strength(password, &self.requirements) {
            Ok(())
        } else {
            Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters and meet the configured requirements",
                self.requirements.min_length
            )))
        }
    }
}

/// Hash on the blocking pool
async fn hash_off_thread(password: &str) -> Result<String, AppError> {
    let plain = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_secure(plain))
        .await?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

async fn verify_off_thread(hash: &str, password: &str) -> Result<bool, AppError> {
    let hash = hash.to_string();
    let plain = password.to_string();
    Ok(tokio::task::spawn_blocking(move || verify_password(&hash, &plain)).await?)
}

fn login_failed(reason: AuthFailure) -> AppError {
    counter!(LOGIN_FAILED).increment(1);
    AppError::Auth(reason)
}

#[async_trait]
impl<S: AccountStore> AuthService for DefaultAuth<S> {
    async fn register(&self, username: &str, email: &str, password: &str) -> Result<Account, AppError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        let username = validate_username(username)?.to_string();
        self.check_password_policy(password)?;

        let password_hash = hash_off_thread(password).await?;
        let account = self
            .store
            .insert_account(NewAccount {
                username,
                email,
                password_hash,
                confirmation_token: generate_email_token(),
            })
            .await?;

        counter!(ACCOUNT_REGISTERED).increment(1);
        info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    async fn verify_login(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let email = normalize_email(email);
        let account = self
            .store
            .find_account_by_email(&email)
            .await?
            .ok_or_else(|| login_failed(AuthFailure::NotFound))?;

        if !verify_off_thread(&account.password_hash, password).await? {
            return Err(login_failed(AuthFailure::BadPassword));
        }
        if !account.confirmed {
            return Err(login_failed(AuthFailure::Unconfirmed));
        }

        counter!(LOGIN_SUCCEEDED).increment(1);
        Ok(account)
    }

    async fn confirm(&self, token: &str) -> Result<Account, AppError> {
        let account = self
            .store
            .confirm_account(token)
            .await?
            .ok_or(AppError::InvalidToken)?;
        info!(account_id = %account.id, "account confirmed");
        Ok(account)
    }

    async fn request_reset(&self, email: &str) -> Result<Account, AppError> {
        let email = normalize_email(email);
        let account = self
            .store
            .replace_token(&email, &generate_email_token())
            .await?
            .ok_or_else(|| AppError::NotFound("account".to_string()))?;
        info!(account_id = %account.id, "password reset requested");
        Ok(account)
    }

    async fn check_reset_token(&self, token: &str) -> Result<Account, AppError> {
        self.store
            .find_account_by_token(token)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Account, AppError> {
        self.check_password_policy(new_password)?;
        let password_hash = hash_off_thread(new_password).await?;
        let account = self
            .store
            .reset_password(token, &password_hash)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let dropped = self.sm.remove_account(account.id).await;
        info!(account_id = %account.id, dropped_sessions = dropped, "password reset");
        Ok(account)
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, AppError> {
        self.store.find_account_by_id(id).await
    }

    async fn new_session(&self, account_id: AccountId) -> String {
        self.sm.new_session(account_id).await
    }

    async fn get_session(&self, token: &str) -> Option<Session> {
        self.sm.get(token).await
    }

    async fn end_session(&self, token: &str) -> bool {
        self.sm.remove(token).await
    }
}
