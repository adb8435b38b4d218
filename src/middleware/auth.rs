use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::identity::Identity;

/// Access token claims; `sub` holds the identity
#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: Value,
}

/// Optional authentication: a request without a token is anonymous, a
/// request with an invalid token is rejected. The identity group is then
/// assigned from the request origin.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let security = &state.config.security;
    let identity = match extract_jwt(request.headers(), &security.jwt_cookie_name) {
        Some(token) => {
            let claims = validate_jwt(&token, security).map_err(ApiError::unauthorized)?;
            Identity::from_claim(&claims.sub)
        }
        None => Identity::anonymous(),
    };

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let identity = state.origin.detect(identity, host);

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Token from the access cookie, else from a Bearer Authorization header
fn extract_jwt(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, token)| token.to_string());

    from_cookie
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|auth| auth.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

fn validate_jwt(token: &str, security: &SecurityConfig) -> Result<Claims, String> {
    if security.jwt_secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| format!("Invalid JWT token: {}", e))?;

    Ok(token_data.claims)
}
