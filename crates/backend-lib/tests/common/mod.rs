//! Test utilities for the HTTP-level tests
//!
//! Builds the full router over in-memory storage and a recording mailer, plus
//! small helpers for requests, cookies and multipart bodies.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use backend_lib::{
    config::Settings,
    create_router,
    error::AppError,
    mail::MemoryMailer,
    models::{Account, CookieAudit, Instrument, InstrumentFields, NewAccount, StorageLocation},
    storage::{AccountStore, CatalogStore, MemoryStorage, Storage, TelemetryStore},
    AppState,
};
use serde_json::Value;
use std::sync::Arc;
use toolroom_common::{AccountId, InstrumentId, StorageLocationId};
use tower::ServiceExt;

pub const PASSWORD: &str = "pw123";
const BOUNDARY: &str = "toolroom-test-boundary";

pub struct TestApp<S> {
    pub router: Router,
    pub state: Arc<AppState<S>>,
    pub mailer: MemoryMailer,
}

pub fn setup_with<S: Storage>(storage: S, mailer: MemoryMailer) -> TestApp<S> {
    let state = Arc::new(AppState::new(
        storage,
        Settings::default(),
        Arc::new(mailer.clone()),
    ));
    TestApp {
        router: create_router(state.clone()),
        state,
        mailer,
    }
}

pub fn setup() -> TestApp<MemoryStorage> {
    setup_with(MemoryStorage::new(), MemoryMailer::new())
}

impl<S: Storage> TestApp<S> {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Token from the last link mailed to `email` under `path`, e.g. "/confirm/"
    pub fn mailed_token(&self, email: &str, path: &str) -> String {
        let mail = self.mailer.last_to(email).expect("no mail sent");
        let start = mail.html.find(path).expect("link missing") + path.len();
        mail.html[start..]
            .split('"')
            .next()
            .unwrap()
            .to_string()
    }

    /// Register, confirm and log in; returns the `Cookie` header value
    pub async fn signed_in(&self, username: &str, email: &str) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/register",
                serde_json::json!({"username": username, "email": email, "password": PASSWORD}),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let token = self.mailed_token(email, "/confirm/");
        let response = self.send(get(&format!("/confirm/{token}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        self.login(email, PASSWORD).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/login",
                serde_json::json!({"email": email, "password": password}),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Multipart instrument form; `photo: Some(&[])` sends an empty file part
pub fn multipart_request(
    method: &str,
    uri: &str,
    fields: &[(&str, &str)],
    photo: Option<&[u8]>,
    cookie: &str,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(photo) = photo {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(photo);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

/// `name=value` part of the response's `Set-Cookie` header
pub fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("no session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// PNG-encoded gradient of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Memory storage whose telemetry writes always fail
#[derive(Clone, Default)]
pub struct BrokenTelemetry(pub MemoryStorage);

#[async_trait]
impl AccountStore for BrokenTelemetry {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, AppError> {
        self.0.insert_account(account).await
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, AppError> {
        self.0.find_account_by_id(id).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        self.0.find_account_by_email(email).await
    }

    async fn find_account_by_token(&self, token: &str) -> Result<Option<Account>, AppError> {
        self.0.find_account_by_token(token).await
    }

    async fn confirm_account(&self, token: &str) -> Result<Option<Account>, AppError> {
        self.0.confirm_account(token).await
    }

    async fn replace_token(&self, email: &str, token: &str) -> Result<Option<Account>, AppError> {
        self.0.replace_token(email, token).await
    }

    async fn reset_password(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, AppError> {
        self.0.reset_password(token, password_hash).await
    }
}

#[async_trait]
impl CatalogStore for BrokenTelemetry {
    async fn list_instruments(&self, owner: AccountId) -> Result<Vec<Instrument>, AppError> {
        self.0.list_instruments(owner).await
    }

    async fn get_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
    ) -> Result<Instrument, AppError> {
        self.0.get_instrument(id, owner).await
    }

    async fn create_instrument(
        &self,
        fields: InstrumentFields,
        owner: AccountId,
    ) -> Result<Instrument, AppError> {
        self.0.create_instrument(fields, owner).await
    }

    async fn update_instrument(
        &self,
        id: InstrumentId,
        owner: AccountId,
        fields: InstrumentFields,
    ) -> Result<Instrument, AppError> {
        self.0.update_instrument(id, owner, fields).await
    }

    async fn delete_instrument(&self, id: InstrumentId, owner: AccountId) -> Result<(), AppError> {
        self.0.delete_instrument(id, owner).await
    }

    async fn list_storage_locations(&self) -> Result<Vec<StorageLocation>, AppError> {
        self.0.list_storage_locations().await
    }

    async fn create_storage_location(&self, name: &str) -> Result<StorageLocation, AppError> {
        self.0.create_storage_location(name).await
    }

    async fn update_storage_location(
        &self,
        id: StorageLocationId,
        name: &str,
    ) -> Result<StorageLocation, AppError> {
        self.0.update_storage_location(id, name).await
    }

    async fn delete_storage_location(&self, id: StorageLocationId) -> Result<(), AppError> {
        self.0.delete_storage_location(id).await
    }
}

#[async_trait]
impl TelemetryStore for BrokenTelemetry {
    async fn record_cookies(&self, _rows: Vec<CookieAudit>) -> Result<(), AppError> {
        Err(AppError::Internal("telemetry table unavailable".to_string()))
    }
}
