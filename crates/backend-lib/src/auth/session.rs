// ============================
// toolroom-backend-lib/src/auth/session.rs
// ============================
//! Login session handling and management.
use std::{collections::HashMap, sync::Arc, time::{Duration, SystemTime}};

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use toolroom_common::AccountId;

use super::token_generator::generate_session_token;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};

/// Default session TTL (time to live)
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7); // 7 days

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "toolroom_session";

/// Session information
#[derive(Clone, Debug)]
pub struct Session {
    pub account_id: AccountId,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

/// Session manager for handling login tokens
#[derive(Clone, Debug)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(ttl: Duration) -> Self {
        SessionManager {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Create a new session
    pub async fn new_session(&self, account_id: AccountId) -> String {
        let token = generate_session_token();
        let now = SystemTime::now();
        let session = Session {
            account_id,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        token
    }

    /// Get a live session by token
    pub async fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|session| SystemTime::now() < session.expires_at)
            .cloned()
    }

    /// End a session. Returns whether it existed.
    pub async fn remove(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(token).is_some();
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        removed
    }

    /// Drop every session of an account, e.g. after a password reset
    pub async fn remove_account(&self, account_id: AccountId) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.account_id != account_id);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        before - sessions.len()
    }

    /// Remove expired sessions
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = SystemTime::now();
        let before_count = sessions.len();

        sessions.retain(|_, session| now < session.expires_at);

        let after_count = sessions.len();
        let removed = before_count - after_count;

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(after_count as f64);
            tracing::debug!(removed, "expired sessions removed");
        }
        removed
    }

    /// Sweep expired sessions once per `interval`, forever
    pub fn spawn_cleanup_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.cleanup_expired_sessions().await;
            }
        })
    }
}
