// ============================
// crates/backend-lib/src/handlers/account.rs
// ============================
//! Registration, login and password reset.
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Extensions, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use metrics::counter;
use toolroom_common::{
    ApiMessage, LoginRequest, LoginResponse, NewPasswordRequest, RegisterRequest, ResetRequest,
};
use tracing::{info, warn};

use crate::auth::SESSION_COOKIE;
use crate::error::{AppError, AuthFailure};
use crate::mail::{confirmation_email, reset_email, CONFIRMATION_SUBJECT, RESET_SUBJECT};
use crate::metrics::LOGIN_THROTTLED;
use crate::middleware::{client_ip, session_token};
use crate::storage::Storage;
use crate::AppState;

/// Send one email; a failure becomes a warning on the response instead of an error
async fn send_or_warn<S>(
    state: &AppState<S>,
    subject: &str,
    to: &str,
    html: &str,
    message: ApiMessage,
) -> ApiMessage {
    match state.mailer.send(subject, to, html).await {
        Ok(()) => message,
        Err(e) => {
            warn!(error = %e, subject, "account email not delivered");
            message.with_warning("The email could not be sent, please try again later")
        },
    }
}

fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

pub async fn register<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.auth.register(&req.username, &req.email, &req.password).await?;
    let token = account.confirmation_token.as_deref().unwrap_or_default();
    let link = state.settings.external_url(&format!("/confirm/{token}"));

    let message = send_or_warn(
        &state,
        CONFIRMATION_SUBJECT,
        &account.email,
        &confirmation_email(&link),
        ApiMessage::new("A confirmation email has been sent"),
    )
    .await;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn login<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ip = client_ip(&headers, extensions.get())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    if !state.auth_rate_limiter.try_begin(ip) {
        counter!(LOGIN_THROTTLED).increment(1);
        return Err(AppError::AuthRateLimited);
    }

    let account = match state.auth.verify_login(&req.email, &req.password).await {
        Ok(account) => account,
        Err(err @ AppError::Auth(AuthFailure::NotFound | AuthFailure::BadPassword)) => {
            return Err(err);
        },
        Err(err) => {
            state.auth_rate_limiter.release(ip);
            return Err(err);
        },
    };
    state.auth_rate_limiter.record_success(ip);

    let token = state.auth.new_session(account.id).await;
    info!(account_id = %account.id, %ip, "logged in");

    let cookie = session_cookie(&token, state.settings.session_ttl_secs);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            account: account.view(),
        }),
    ))
}

pub async fn logout<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.auth.end_session(&token).await;
    }
    (
        [(header::SET_COOKIE, session_cookie("", 0))],
        Json(ApiMessage::new("Logged out")),
    )
}

pub async fn confirm<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Result<Json<ApiMessage>, AppError> {
    state.auth.confirm(&token).await?;
    Ok(Json(ApiMessage::new("Account confirmed, you can now log in")))
}

pub async fn request_reset<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ApiMessage>, AppError> {
    let account = state.auth.request_reset(&req.email).await?;
    let token = account.confirmation_token.as_deref().unwrap_or_default();
    let link = state.settings.external_url(&format!("/reset-password/{token}"));

    let message = send_or_warn(
        &state,
        RESET_SUBJECT,
        &account.email,
        &reset_email(&link),
        ApiMessage::new("A password reset email has been sent"),
    )
    .await;
    Ok(Json(message))
}

pub async fn check_reset_token<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Result<Json<ApiMessage>, AppError> {
    state.auth.check_reset_token(&token).await?;
    Ok(Json(ApiMessage::new("Reset link is valid")))
}

pub async fn reset_password<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    Json(req): Json<NewPasswordRequest>,
) -> Result<Json<ApiMessage>, AppError> {
    state.auth.reset_password(&token, &req.password).await?;
    Ok(Json(ApiMessage::new("Password updated, you can now log in")))
}
