//! Object storage handlers: the three route groups consuming the
//! [`StorageGateway`](crate::storage::gateway::StorageGateway).
//!
//! Handlers never look at which backend is active; they delegate and
//! let the error type drive what gets rendered (`WrongPlatform` and
//! `NotFound` have dedicated pages, everything else shows the detail).

use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

use crate::errors::{AppError, StorageError};
use crate::metrics::record_storage_operation;
use crate::pages;
use crate::storage::gateway::RuntimeMode;
use crate::AppState;

/// Form payload for `/storage/upload`.
#[derive(Debug, Deserialize)]
pub struct UploadForm {
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

/// Outcome label for the storage operation counter.
fn outcome<T>(result: &Result<T, StorageError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    }
}

/// Keys are opaque to the backends, but reject empties and traversal
/// segments here so a demo upload can't escape into odd corners of a
/// shared bucket.
fn acceptable_key(key: &str) -> bool {
    !key.is_empty() && !key.split('/').any(|segment| segment == "..")
}

/// `GET /storage` -- the listing view.
pub async fn browse(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let result = state.gateway.list().await;
    record_storage_operation("list", outcome(&result));
    let listing = result?;

    let mode = state.gateway.mode().unwrap_or(RuntimeMode::None);
    Ok(Html(pages::storage_page(
        &listing.container_name,
        mode,
        &listing.items,
    ))
    .into_response())
}

/// `GET /storage/view/*key` -- the read view.
pub async fn view(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let result = state.gateway.get(&key).await;
    record_storage_operation("get", outcome(&result));
    let content = result?;

    let text = String::from_utf8_lossy(&content.bytes);
    Ok(Html(pages::object_page(&content.key, &text)).into_response())
}

/// `POST /storage/upload` -- the write action; text objects only.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Form(form): Form<UploadForm>,
) -> Result<Response, AppError> {
    if !acceptable_key(&form.filename) {
        return Err(AppError::InvalidFilename {
            name: form.filename,
        });
    }

    let result = state
        .gateway
        .put(&form.filename, Bytes::from(form.content), "text/plain")
        .await;
    record_storage_operation("put", outcome(&result));
    result?;

    info!("stored object: {}", form.filename);
    Ok(Redirect::to("/storage").into_response())
}

// -- Tests -------------------------------------------------------------------
