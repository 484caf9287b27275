// ============================
// crates/backend-lib/src/middleware/session_gate.rs
// ============================
//! Resolves the session cookie to an account and records cookie telemetry.
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use metrics::counter;
use tracing::{debug, warn};

use crate::auth::{DeviceInfo, SESSION_COOKIE};
use crate::error::AppError;
use crate::metrics::{TELEMETRY_FAILED, TELEMETRY_RECORDED};
use crate::models::{Account, CookieAudit};
use crate::storage::Storage;
use crate::AppState;

/// The authenticated account, inserted into request extensions by [`require_session`]
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

/// All `name=value` pairs from the request's `Cookie` headers, in order
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Value of the session cookie, if the request carries one
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookies(headers)
        .into_iter()
        .find(|(name, _)| name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// Client address: `x-real-ip`, then the first `x-forwarded-for` hop, then the peer
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-real-ip")
        .or_else(|| header_ip("x-forwarded-for"))
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip()))
}

fn audit_rows(account: &Account, request: &Request) -> Vec<CookieAudit> {
    let headers = request.headers();
    let ip_address = client_ip(headers, request.extensions().get::<ConnectInfo<SocketAddr>>())
        .map(|ip| ip.to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let device = user_agent
        .as_deref()
        .map_or_else(DeviceInfo::other, DeviceInfo::from_user_agent)
        .to_string();
    let recorded_at = Utc::now();

    parse_cookies(headers)
        .into_iter()
        .map(|(cookie_name, cookie_value)| CookieAudit {
            account_id: account.id,
            cookie_name,
            cookie_value,
            ip_address: ip_address.clone(),
            user_agent: user_agent.clone(),
            device: device.clone(),
            country: None,
            recorded_at,
        })
        .collect()
}

/// Write audit rows in the background. Failures are logged and counted only.
fn record_telemetry<S: Storage>(storage: S, rows: Vec<CookieAudit>) {
    if rows.is_empty() {
        return;
    }

    tokio::spawn(async move {
        let count = rows.len();
        match storage.record_cookies(rows).await {
            Ok(()) => counter!(TELEMETRY_RECORDED).increment(count as u64),
            Err(e) => {
                counter!(TELEMETRY_FAILED).increment(1);
                warn!(error = %e, "cookie telemetry not recorded");
            },
        }
    });
}

/// Session gate for authenticated routes
pub async fn require_session<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or(AppError::Unauthenticated)?;
    let session = state
        .auth
        .get_session(&token)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let Some(account) = state.auth.find_account(session.account_id).await? else {
        debug!(account_id = %session.account_id, "session for missing account ended");
        state.auth.end_session(&token).await;
        return Err(AppError::Unauthenticated);
    };

    record_telemetry(state.storage.clone(), audit_rows(&account, &request));

    request.extensions_mut().insert(CurrentAccount(account));
    Ok(next.run(request).await)
}
