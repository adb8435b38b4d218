use axum::{
    extract::{Extension, Query},
    response::Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::viewer::{MapViewer, UserInfoUpdate};

/// GET|POST /setuserinfo - store whitelisted profile fields of the signed in user
pub async fn set_user_info(
    Extension(viewer): Extension<Arc<MapViewer>>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<UserInfoUpdate>, ApiError> {
    let update = viewer.set_user_info(&identity, &params).await?;
    Ok(Json(update))
}
