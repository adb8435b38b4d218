use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;

/// Tenant of the current request
#[derive(Clone, Debug, PartialEq)]
pub struct Tenant(pub String);

/// Resolves the tenant from the configured header (or the default tenant)
/// and injects its loaded viewer service.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let tenants = &state.config.tenants;
    let tenant = tenants
        .tenant_header
        .as_deref()
        .and_then(|name| request.headers().get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(&tenants.default_tenant)
        .to_string();

    let viewer = state.viewers.get_or_load(&tenant).await?;

    request.extensions_mut().insert(Tenant(tenant));
    request.extensions_mut().insert(viewer);
    Ok(next.run(request).await)
}
