use axum::{
    extract::{Extension, OriginalUri, Query},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::viewer::{IndexRequest, IndexResponse, MapViewer};

/// GET / - viewer index page, or a redirect to login or to default params
pub async fn index(
    Extension(viewer): Extension<Arc<MapViewer>>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let request = IndexRequest {
        url: request_url(&headers, &uri),
        params,
    };

    match viewer.index(&identity, &request).await? {
        IndexResponse::Redirect(location) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
        IndexResponse::Page(path) => {
            let page = tokio::fs::read_to_string(&path).await.map_err(|e| {
                tracing::error!("Could not read {}: {}", path.display(), e);
                ApiError::internal_server_error("Viewer index could not be read")
            })?;
            Ok(Html(page).into_response())
        }
    }
}

/// Absolute URL of the request as the client sent it
fn request_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
    };
    let scheme = header_value("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header_value("x-forwarded-host")
        .or_else(|| header_value(header::HOST.as_str()))
        .unwrap_or_else(|| "localhost".to_string());
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}://{}{}", scheme, host, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Uri};

    #[test]
    fn url_from_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("backend:9090"));
        let uri: Uri = "/?t=parks".parse().unwrap();
        assert_eq!(request_url(&headers, &uri), "http://backend:9090/?t=parks");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("maps.example.com"));
        assert_eq!(request_url(&headers, &uri), "https://maps.example.com/?t=parks");
    }
}
