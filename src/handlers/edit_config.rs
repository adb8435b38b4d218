use axum::{
    extract::{Extension, Query},
    response::Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::themes::EditDataset;
use crate::viewer::MapViewer;

#[derive(Debug, Deserialize)]
pub struct EditConfigQuery {
    /// WMS name of the map
    pub map: Option<String>,
    /// Comma separated layer names
    #[serde(default)]
    pub layers: String,
}

impl EditConfigQuery {
    fn layer_names(&self) -> Vec<String> {
        self.layers
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// GET /editConfig.json - permitted edit datasets of a map
pub async fn edit_config(
    Extension(viewer): Extension<Arc<MapViewer>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<EditConfigQuery>,
) -> Result<Json<BTreeMap<String, EditDataset>>, ApiError> {
    let map = query
        .map
        .as_deref()
        .filter(|map| !map.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'map' parameter"))?;

    let datasets = viewer.edit_config(&identity, map, &query.layer_names())?;
    Ok(Json(datasets))
}
