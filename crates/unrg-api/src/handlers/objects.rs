//! File and image handlers.
//!
//! Each route is a thin adapter: pull the name from the path or the upload,
//! delegate to the store, wrap the result in the JSON envelope.

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use tracing::{info, warn};
use unrg_models::{
    image_name_from_filename, DeleteResponse, FileListResponse, ImageListResponse, Namespace,
    ObjectName, UploadFileResponse, UploadImageResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Files
// ============================================================================

pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadFileResponse>> {
    let filename = receive_upload(&state, Namespace::File, multipart).await?;
    Ok(Json(UploadFileResponse {
        message: "File uploaded successfully".to_string(),
        filename,
    }))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    serve_object(&state, Namespace::File, &filename).await
}

pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<FileListResponse>> {
    let files = state.storage.list(Namespace::File).await?;
    Ok(Json(FileListResponse { files }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    remove_object(&state, Namespace::File, &filename).await
}

// ============================================================================
// Images
// ============================================================================

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadImageResponse>> {
    let image_name = receive_upload(&state, Namespace::Image, multipart).await?;
    Ok(Json(UploadImageResponse {
        message: "Image uploaded successfully".to_string(),
        image_name,
    }))
}

pub async fn download_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    serve_object(&state, Namespace::Image, &name).await
}

pub async fn list_images(State(state): State<AppState>) -> ApiResult<Json<ImageListResponse>> {
    let images = state.storage.list(Namespace::Image).await?;
    Ok(Json(ImageListResponse { images }))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    remove_object(&state, Namespace::Image, &name).await
}

// ============================================================================
// Shared
// ============================================================================

fn missing_upload(namespace: Namespace) -> ApiError {
    match namespace {
        Namespace::File => ApiError::bad_request("Failed to get file from request"),
        Namespace::Image => ApiError::bad_request("Failed to get image file from request"),
    }
}

/// Stream the first file part carrying the namespace's form field into the
/// store. Returns the stored name.
async fn receive_upload(
    state: &AppState,
    namespace: Namespace,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<String> {
    let mut multipart = multipart.map_err(|e| {
        warn!(namespace = %namespace, error = %e, "Rejected upload body");
        missing_upload(namespace)
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(missing_upload(namespace)),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Malformed multipart body");
                return Err(missing_upload(namespace));
            }
        };

        if field.name() != Some(namespace.form_field()) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let name = match namespace {
            Namespace::File => filename.as_str(),
            Namespace::Image => image_name_from_filename(&filename),
        };
        let name = ObjectName::parse(name).map_err(|e| {
            warn!(namespace = %namespace, filename = %filename, error = %e, "Rejected upload name");
            ApiError::bad_request(format!("Invalid name: {}", e))
        })?;

        let written = state.storage.put_stream(namespace, name.as_str(), field).await?;
        metrics::record_object_stored(namespace, written);
        info!(namespace = %namespace, name = %name, bytes = written, "Upload complete");

        return Ok(name.into_inner());
    }
}

async fn serve_object(state: &AppState, namespace: Namespace, name: &str) -> ApiResult<Response> {
    let object = state.storage.get(namespace, name).await?;
    let size = object.size;
    let disposition = content_disposition(&namespace.download_filename(object.name.as_str()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(metrics::count_bytes_served(
            namespace,
            object.into_stream(),
        )))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

async fn remove_object(
    state: &AppState,
    namespace: Namespace,
    name: &str,
) -> ApiResult<Json<DeleteResponse>> {
    state.storage.delete(namespace, name).await?;
    metrics::record_object_deleted(namespace);

    Ok(Json(DeleteResponse {
        message: format!("{} deleted successfully", namespace.display_noun()),
    }))
}

/// `attachment; filename="<name>"` with quotes and backslashes escaped.
fn content_disposition(filename: &str) -> String {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition() {
        assert_eq!(content_disposition("a.bin"), "attachment; filename=\"a.bin\"");
        assert_eq!(
            content_disposition("nginx.tar.gz"),
            "attachment; filename=\"nginx.tar.gz\""
        );
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            "attachment; filename=\"say \\\"hi\\\".txt\""
        );
    }

    #[test]
    fn test_missing_upload_messages() {
        assert_eq!(
            missing_upload(Namespace::File).to_string(),
            "Failed to get file from request"
        );
        assert_eq!(
            missing_upload(Namespace::Image).to_string(),
            "Failed to get image file from request"
        );
    }
}
