use axum::{
    extract::{Extension, Path},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::viewer::MapViewer;

/// GET /assets/img/base64/*path - thumbnails extracted from Base64 theme data
pub async fn extracted_image(
    Extension(viewer): Extension<Arc<MapViewer>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let file = viewer
        .extracted_image(&path)
        .ok_or_else(|| ApiError::not_found("Image not found"))?;
    let bytes = tokio::fs::read(&file)
        .await
        .map_err(|_| ApiError::not_found("Image not found"))?;

    Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response())
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
