use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::AppState;

/// Serve a stored photo by object key. This is where local-backend public
/// URLs point.
/// Route: GET /static/*key
pub async fn serve_static(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.object_store.get(&key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey { .. } => {
            ApiError::not_found("File not found")
        }
        _ => {
            tracing::error!(key = %key, error = %e, "Failed to retrieve photo");
            ApiError::internal("Failed to retrieve file")
        }
    })?;

    let mime_type = mime_guess::from_path(&key).first_or_octet_stream();
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .essence_str()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    // Keys carry a timestamp and random token, so content never changes.
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok(response)
}
