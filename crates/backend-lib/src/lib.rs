// ============================
// toolroom-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the toolroom inventory server.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod photo;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use crate::auth::{AuthRateLimiter, AuthService, DefaultAuth, SessionManager};
use crate::config::Settings;
use crate::mail::Mailer;
use crate::storage::Storage;

pub use router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState<S> {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session manager, shared with `auth`
    pub sessions: SessionManager,
    /// Settings
    pub settings: Arc<Settings>,
    /// Storage backend
    pub storage: S,
    /// Outgoing mail
    pub mailer: Arc<dyn Mailer>,
    /// Failed login lockout
    pub auth_rate_limiter: Arc<AuthRateLimiter>,
}

impl<S: Storage> AppState<S> {
    /// Create a new application state
    pub fn new(storage: S, settings: Settings, mailer: Arc<dyn Mailer>) -> Self {
        let sessions = SessionManager::new(settings.session_ttl());
        let auth = Arc::new(DefaultAuth::new(
            storage.clone(),
            sessions.clone(),
            settings.password_requirements.clone(),
        ));
        let auth_rate_limiter = Arc::new(AuthRateLimiter::from_settings(&settings.auth_rate_limit));

        Self {
            auth,
            sessions,
            settings: Arc::new(settings),
            storage,
            mailer,
            auth_rate_limiter,
        }
    }
}
