//! Mounted-resource handlers: the persistent volume browser, secret and
//! config file renders.
//!
//! File writes follow the temp-then-rename pattern so a crash mid-write
//! never leaves a torn file in the volume.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::pages;
use crate::AppState;

/// Query payload for `/filesystem`.
#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    /// When set, render this file's contents instead of the listing.
    pub file: Option<String>,
}

/// Form payload for `/create-file`.
#[derive(Debug, Deserialize)]
pub struct CreateFileForm {
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

/// A plain filename: something that names an entry directly inside the
/// persistent directory.  No separators, no traversal, no control or
/// reserved characters.
fn valid_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && !name.chars().any(|c| {
            c.is_control() || matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*')
        })
}

/// List entry names in the persistent directory, sorted for a stable
/// render.
fn list_dir(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with(".tmp-"))
        .collect();
    names.sort();
    Ok(names)
}

/// `GET /filesystem` -- list the persistent volume, or render one file
/// with `?file=<name>`.
pub async fn browse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BrowseQuery>,
) -> Result<Response, AppError> {
    if !state.mounts.filesystem {
        return Ok(Html(pages::mount_missing_page("persistent volume")).into_response());
    }

    let dir = &state.config.mounts.data_dir;
    let items = list_dir(dir)?;

    let Some(name) = query.file.filter(|f| !f.is_empty()) else {
        return Ok(Html(pages::filesystem_page(&dir.display().to_string(), &items, None))
            .into_response());
    };

    if !valid_filename(&name) {
        error!("rejected filesystem read for invalid name: {:?}", name);
        return Err(AppError::InvalidFilename { name });
    }

    let path = dir.join(&name);
    let metadata = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(_) => {
            error!("File not found.");
            return Ok(Html(pages::filesystem_page(
                &dir.display().to_string(),
                &items,
                Some("File not found."),
            ))
            .into_response());
        }
    };

    if !metadata.is_file() {
        let notice = format!(
            "Path ({}) is not a file. Please only attempt to read files.",
            name
        );
        error!("{}", notice);
        return Ok(Html(pages::filesystem_page(
            &dir.display().to_string(),
            &items,
            Some(&notice),
        ))
        .into_response());
    }

    let bytes = std::fs::read(&path)?;
    let contents = String::from_utf8_lossy(&bytes);
    info!("rendering file contents for: {}", name);
    Ok(Html(pages::file_page(&name, &contents)).into_response())
}

/// `POST /create-file` -- write a new file into the persistent volume.
pub async fn create_file(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CreateFileForm>,
) -> Result<Response, AppError> {
    if !state.mounts.filesystem {
        return Ok(Html(pages::mount_missing_page("persistent volume")).into_response());
    }

    let dir = &state.config.mounts.data_dir;

    if !valid_filename(&form.filename) {
        let notice = format!("Invalid filename: \"{}\".", form.filename);
        error!("{}", notice);
        let items = list_dir(dir)?;
        return Ok(Html(pages::filesystem_page(
            &dir.display().to_string(),
            &items,
            Some(&notice),
        ))
        .into_response());
    }

    write_atomically(dir, &form.filename, form.content.as_bytes())?;
    info!("created file: {}", form.filename);

    Ok(Redirect::to("/filesystem").into_response())
}

/// Write to a temp name in the same directory, fsync, then rename over
/// the final path.
fn write_atomically(dir: &Path, filename: &str, content: &[u8]) -> std::io::Result<()> {
    let tmp_path = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
    let final_path = dir.join(filename);

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, &final_path)?;
    Ok(())
}

/// `GET /secrets` -- render the mounted secret.
pub async fn secrets(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    if !state.mounts.secret {
        return Ok(Html(pages::mount_missing_page("secret")).into_response());
    }

    let bytes = std::fs::read(&state.config.mounts.secret_file)?;
    Ok(Html(pages::secret_page(&String::from_utf8_lossy(&bytes))).into_response())
}

/// `GET /configmaps` -- render the mounted config file.
pub async fn configmaps(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    if !state.mounts.config_map {
        return Ok(Html(pages::mount_missing_page("config map")).into_response());
    }

    let bytes = std::fs::read(&state.config.mounts.config_file)?;
    Ok(Html(pages::config_page(&String::from_utf8_lossy(&bytes))).into_response())
}

// -- Tests -------------------------------------------------------------------
