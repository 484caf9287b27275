// ============================
// toolroom-backend-lib/src/router.rs
// ============================
//! HTTP routes.
use crate::handlers::{account, catalog, health};
use crate::middleware::require_session;
use crate::storage::Storage;
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Largest accepted request body; uploads are normalized down afterwards
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Create the application router
pub fn create_router<S: Storage>(state: Arc<AppState<S>>) -> Router {
    let authenticated = Router::new()
        .route(
            "/instruments",
            get(catalog::list_instruments::<S>).post(catalog::create_instrument::<S>),
        )
        .route(
            "/instruments/{id}",
            get(catalog::get_instrument::<S>)
                .post(catalog::update_instrument::<S>)
                .delete(catalog::delete_instrument::<S>),
        )
        .route(
            "/storage-locations",
            get(catalog::list_storage_locations::<S>).post(catalog::create_storage_location::<S>),
        )
        .route(
            "/storage-locations/{id}",
            post(catalog::rename_storage_location::<S>).delete(catalog::delete_storage_location::<S>),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session::<S>));

    Router::new()
        .route("/health", get(health))
        .route("/register", post(account::register::<S>))
        .route("/login", post(account::login::<S>))
        .route("/logout", post(account::logout::<S>))
        .route("/confirm/{token}", get(account::confirm::<S>))
        .route("/reset-password", post(account::request_reset::<S>))
        .route(
            "/reset-password/{token}",
            get(account::check_reset_token::<S>).post(account::reset_password::<S>),
        )
        .merge(authenticated)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
