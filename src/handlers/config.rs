use axum::{
    extract::{Extension, Query},
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::viewer::{MapViewer, ViewerConfig};

#[derive(Debug, Default, Deserialize)]
pub struct ConfigQuery {
    pub autologin: Option<String>,
}

/// GET /config.json - viewer application config for the requesting identity
pub async fn config(
    Extension(viewer): Extension<Arc<MapViewer>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<ViewerConfig>, ApiError> {
    // Any `autologin` param, or an autologin identity, hides the logout entry
    let autologin = identity.autologin || query.autologin.is_some();
    let config = viewer.config(&identity, autologin).await?;
    Ok(Json(config))
}
