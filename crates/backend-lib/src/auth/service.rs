use async_trait::async_trait;
use toolroom_common::AccountId;

use super::Session;
use crate::error::AppError;
use crate::models::Account;

/// Credential lifecycle plus the login sessions built on it
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an unconfirmed account; its `confirmation_token` is the token to mail
    async fn register(&self, username: &str, email: &str, password: &str) -> Result<Account, AppError>;

    /// Check credentials. The password is verified before the confirmed flag.
    async fn verify_login(&self, email: &str, password: &str) -> Result<Account, AppError>;

    async fn confirm(&self, token: &str) -> Result<Account, AppError>;

    /// Issue a fresh reset token, invalidating any earlier one
    async fn request_reset(&self, email: &str) -> Result<Account, AppError>;

    /// Look up the account behind a reset token without consuming it
    async fn check_reset_token(&self, token: &str) -> Result<Account, AppError>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Account, AppError>;

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, AppError>;

    async fn new_session(&self, account_id: AccountId) -> String;

    async fn get_session(&self, token: &str) -> Option<Session>;

    /// Returns whether the session existed
    async fn end_session(&self, token: &str) -> bool;
}
