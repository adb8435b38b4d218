#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use map_viewer_api::app::{router, AppState};
use map_viewer_api::config::AppConfig;

pub const JWT_SECRET: &str = "test-secret";
pub const TENANT: &str = "default";

/// Config root with one tenant; removed when dropped
pub struct TestTenant {
    pub root: TempDir,
}

impl TestTenant {
    pub fn new() -> Result<Self> {
        let root = tempfile::tempdir()?;
        write_tenant(root.path(), TENANT, &viewer_document(), &permissions_document())?;
        Ok(Self { root })
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::development();
        config.tenants.config_path = self.root.path().to_path_buf();
        config.tenants.tenant_header = Some("x-tenant".to_string());
        config.security.jwt_secret = JWT_SECRET.to_string();
        config.server.enable_request_logging = false;
        config
    }

    pub fn router(&self) -> Result<Router> {
        Ok(router(AppState::new(self.config())?))
    }
}

pub fn write_tenant(root: &Path, tenant: &str, viewer: &Value, permissions: &Value) -> Result<()> {
    let dir = root.join(tenant);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("mapViewerConfig.json"), serde_json::to_string_pretty(viewer)?)?;
    std::fs::write(dir.join("permissions.json"), serde_json::to_string_pretty(permissions)?)?;
    std::fs::write(dir.join("index.html"), "<html><body>viewer</body></html>")?;
    Ok(())
}

pub fn viewer_document() -> Value {
    json!({
        "config": {
            "auth_service_url": "/auth",
            "ogc_service_url": "http://ogc",
            "redirect_restricted_themes_to_auth": true
        },
        "resources": {
            "qwc2_config": {
                "restricted_viewer_tasks": ["Print"],
                "config": {
                    "plugins": {
                        "mobile": [],
                        "desktop": [
                            {"name": "TopBar", "cfg": {"menuItems": [
                                {"key": "Print"},
                                {"key": "Login", "icon": "login"}
                            ]}},
                            {"name": "Print", "cfg": {}}
                        ]
                    }
                }
            },
            "qwc2_themes": {
                "themes": {
                    "title": "root",
                    "items": [
                        {
                            "id": "parks", "name": "parks", "title": "Parks", "wms_name": "parks",
                            "sublayers": [{"name": "trees"}, {"name": "benches"}],
                            "translations": {"de": {"title": "Parkanlagen"}},
                            "editConfig": {"trees": {"fields": [{"id": "species"}, {"id": "height"}]}}
                        },
                        {
                            "id": "utilities", "name": "utilities", "title": "Utilities", "wms_name": "utilities",
                            "sublayers": [{"name": "pipes"}]
                        }
                    ],
                    "subdirs": []
                }
            }
        }
    })
}

pub fn permissions_document() -> Value {
    json!({
        "users": [{"name": "alice", "roles": ["staff"]}],
        "groups": [],
        "roles": [
            {"role": "public", "permissions": {
                "wms_services": [{"name": "parks", "layers": [{"name": "parks"}, {"name": "trees"}]}],
                "data_datasets": [{"name": "parks.trees", "attributes": ["species"]}]
            }},
            {"role": "staff", "permissions": {
                "wms_services": [{"name": "utilities", "layers": [{"name": "utilities"}, {"name": "pipes"}]}],
                "viewer_tasks": ["Print"]
            }}
        ]
    })
}

/// Bearer token for a plain username subject
pub fn token_for(username: &str) -> Result<String> {
    let claims = json!({"sub": username, "exp": 4_102_444_800u64});
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes()))?)
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Result<Response> {
    let mut request = Request::builder().uri(uri).header(header::HOST, "maps.example.com");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    Ok(app.clone().oneshot(request.body(Body::empty())?).await?)
}

pub async fn get_json(app: &Router, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
    let response = get(app, uri, token).await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&body)?))
}
