// ============================
// crates/backend-lib/src/handlers/catalog.rs
// ============================
//! Instrument and storage location handlers.
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use toolroom_common::{
    InstrumentId, InstrumentView, StorageLocationId, StorageLocationRequest, StorageLocationView,
};
use tracing::info;

use crate::config::PhotoSettings;
use crate::error::AppError;
use crate::middleware::CurrentAccount;
use crate::models::InstrumentFields;
use crate::photo::normalize_photo;
use crate::storage::Storage;
use crate::validation::{validate_description, validate_name};
use crate::AppState;

/// Instrument form as uploaded
#[derive(Debug, Default)]
struct InstrumentForm {
    name: String,
    description: String,
    storage_location: Option<StorageLocationId>,
    photo: Option<Vec<u8>>,
}

async fn read_instrument_form(mut multipart: Multipart) -> Result<InstrumentForm, AppError> {
    let mut form = InstrumentForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => form.name = field.text().await?,
            Some("description") => form.description = field.text().await?,
            Some("storage_location") => {
                let raw = field.text().await?;
                let raw = raw.trim();
                form.storage_location = if raw.is_empty() {
                    None
                } else {
                    Some(raw.parse().map_err(|_| {
                        AppError::InvalidInput(format!("Invalid storage location id: {raw}"))
                    })?)
                };
            },
            Some("photo") => {
                let bytes = field.bytes().await?;
                // An empty file part is a form submitted without a file
                form.photo = (!bytes.is_empty()).then(|| bytes.to_vec());
            },
            _ => {},
        }
    }

    Ok(form)
}

/// Validate the form and normalize its photo, if any
async fn into_fields(form: InstrumentForm, settings: PhotoSettings) -> Result<InstrumentFields, AppError> {
    let name = validate_name(&form.name)?.to_string();
    validate_description(&form.description)?;

    let photo = match form.photo {
        Some(raw) => {
            let normalized =
                tokio::task::spawn_blocking(move || normalize_photo(&raw, &settings)).await??;
            Some(normalized.bytes)
        },
        None => None,
    };

    Ok(InstrumentFields {
        name,
        description: form.description,
        storage_location_id: form.storage_location,
        photo,
    })
}

pub async fn list_instruments<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<Json<Vec<InstrumentView>>, AppError> {
    let instruments = state.storage.list_instruments(account.id).await?;
    Ok(Json(instruments.iter().map(|i| i.view()).collect()))
}

pub async fn get_instrument<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Path(id): Path<InstrumentId>,
) -> Result<Json<InstrumentView>, AppError> {
    let instrument = state.storage.get_instrument(id, account.id).await?;
    Ok(Json(instrument.view()))
}

pub async fn create_instrument<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_instrument_form(multipart).await?;
    let fields = into_fields(form, state.settings.photo).await?;
    let instrument = state.storage.create_instrument(fields, account.id).await?;

    info!(instrument_id = instrument.id, account_id = %account.id, "instrument created");
    Ok((StatusCode::CREATED, Json(instrument.view())))
}

pub async fn update_instrument<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Path(id): Path<InstrumentId>,
    multipart: Multipart,
) -> Result<Json<InstrumentView>, AppError> {
    let form = read_instrument_form(multipart).await?;
    let fields = into_fields(form, state.settings.photo).await?;
    let instrument = state.storage.update_instrument(id, account.id, fields).await?;
    Ok(Json(instrument.view()))
}

pub async fn delete_instrument<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Path(id): Path<InstrumentId>,
) -> Result<StatusCode, AppError> {
    state.storage.delete_instrument(id, account.id).await?;
    info!(instrument_id = id, account_id = %account.id, "instrument deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_storage_locations<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<StorageLocationView>>, AppError> {
    let locations = state.storage.list_storage_locations().await?;
    Ok(Json(locations.iter().map(|l| l.view()).collect()))
}

pub async fn create_storage_location<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<StorageLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = validate_name(&req.name)?;
    let location = state.storage.create_storage_location(name).await?;
    Ok((StatusCode::CREATED, Json(location.view())))
}

pub async fn rename_storage_location<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<StorageLocationId>,
    Json(req): Json<StorageLocationRequest>,
) -> Result<Json<StorageLocationView>, AppError> {
    let name = validate_name(&req.name)?;
    let location = state.storage.update_storage_location(id, name).await?;
    Ok(Json(location.view()))
}

pub async fn delete_storage_location<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<StorageLocationId>,
) -> Result<StatusCode, AppError> {
    state.storage.delete_storage_location(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
