use axum::{
    extract::{Extension, Query},
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::themes::ThemesDocument;
use crate::viewer::MapViewer;

#[derive(Debug, Deserialize)]
pub struct ThemesQuery {
    /// Locale for item translations, i.e. `de` or `de-CH`
    pub lang: Option<String>,
}

/// GET /themes.json - theme catalog filtered for the requesting identity
pub async fn themes(
    Extension(viewer): Extension<Arc<MapViewer>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ThemesQuery>,
) -> Result<Json<ThemesDocument>, ApiError> {
    let document = viewer.themes(&identity, query.lang.as_deref())?;
    Ok(Json(document))
}
