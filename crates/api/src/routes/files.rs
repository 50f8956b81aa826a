//! Object storage proxy for product images and transfer slips.

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, Success};
use crate::middleware::AdminOnly;
use crate::services::{ObjectStorage, StorageError};
use crate::state::AppState;

use super::json_body;

const UPLOAD_CODE: &str = "files-001";
const DELETE_CODE: &str = "files-002";

/// Accepted image extensions, lowercase.
const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub url: String,
    pub destination: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub destination: String,
}

/// A file part read from the form, not yet stored.
struct PendingFile {
    filename: String,
    extension: String,
    data: Vec<u8>,
}

/// Lowercase extension of `filename` if it is an accepted image type.
fn image_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Folder under the bucket; surrounding slashes are dropped.
fn folder(destination: &str) -> Option<&str> {
    let folder = destination.trim().trim_matches('/');
    (!folder.is_empty()).then_some(folder)
}

fn storage_failure(error_code: &'static str, e: &StorageError) -> ApiError {
    match e {
        StorageError::InvalidDestination(_) | StorageError::NotFound(_) => {
            ApiError::bad_request(error_code, e.to_string())
        }
        StorageError::Io(_) => ApiError::internal(error_code, e.to_string()),
    }
}

/// Store the `files` parts of a multipart form under the `destination`
/// folder. Every part is validated before anything is written.
pub async fn upload(
    State(state): State<AppState>,
    _admin: AdminOnly,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Vec<UploadedFile>> {
    let mut multipart =
        multipart.map_err(|e| ApiError::bad_request(UPLOAD_CODE, e.body_text()))?;
    let file_limit = state.config().app.file_limit;

    let mut destination = String::new();
    let mut pending = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(UPLOAD_CODE, e.body_text()))?
    {
        match field.name() {
            Some("destination") => {
                destination = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(UPLOAD_CODE, e.body_text()))?;
            }
            Some("files") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let extension = image_extension(&filename).ok_or_else(|| {
                    ApiError::bad_request(
                        UPLOAD_CODE,
                        format!("extension of {filename} is not acceptable"),
                    )
                })?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(UPLOAD_CODE, e.body_text()))?;
                if data.len() > file_limit {
                    return Err(ApiError::bad_request(
                        UPLOAD_CODE,
                        format!("file size of {filename} must be less than {file_limit} bytes"),
                    ));
                }
                pending.push(PendingFile {
                    filename,
                    extension,
                    data: data.to_vec(),
                });
            }
            _ => {}
        }
    }

    let folder = folder(&destination)
        .ok_or_else(|| ApiError::bad_request(UPLOAD_CODE, "destination is required"))?;
    if pending.is_empty() {
        return Err(ApiError::bad_request(UPLOAD_CODE, "files are empty"));
    }

    let storage = state.storage();
    let mut uploaded = Vec::with_capacity(pending.len());
    for file in pending {
        let destination = format!("{folder}/{}.{}", Uuid::new_v4(), file.extension);
        let url = storage
            .upload(&destination, &file.data)
            .await
            .map_err(|e| storage_failure(UPLOAD_CODE, &e))?;
        uploaded.push(UploadedFile {
            filename: file.filename,
            url,
            destination,
        });
    }

    Ok(Success::created(uploaded))
}

/// Remove stored objects by destination.
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminOnly,
    payload: Result<Json<Vec<DeleteFileRequest>>, JsonRejection>,
) -> ApiResult<()> {
    let requests = json_body(payload, DELETE_CODE)?;
    if requests.is_empty() {
        return Err(ApiError::bad_request(DELETE_CODE, "files are empty"));
    }

    let storage = state.storage();
    for request in &requests {
        storage
            .delete(&request.destination)
            .await
            .map_err(|e| storage_failure(DELETE_CODE, &e))?;
    }
    Ok(Success::ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("coffee.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("slip.jpg").as_deref(), Some("jpg"));
        assert_eq!(image_extension("notes.pdf"), None);
        assert_eq!(image_extension("png"), None);
    }

    #[test]
    fn test_folder() {
        assert_eq!(folder("/products/"), Some("products"));
        assert_eq!(folder("slips/2024"), Some("slips/2024"));
        assert_eq!(folder("  "), None);
        assert_eq!(folder("/"), None);
    }
}
