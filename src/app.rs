use axum::{middleware, routing::get, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::handlers;
use crate::identity::{OriginConfigError, OriginDetector};
use crate::middleware::{identity_middleware, no_cache_headers, tenant_middleware};
use crate::resources::{ResourceError, ResourceLoader};
use crate::viewer::MapViewer;

/// Shared state handed to middleware and handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub viewers: Arc<ViewerRegistry>,
    pub origin: Arc<OriginDetector>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, OriginConfigError> {
        let origin = OriginDetector::from_config(config.tenants.origin_config.as_deref())?;
        let viewers = ViewerRegistry::new(&config);
        Ok(Self {
            config: Arc::new(config),
            viewers: Arc::new(viewers),
            origin: Arc::new(origin),
        })
    }
}

/// Per-tenant viewer services, loaded on first use
pub struct ViewerRegistry {
    loader: ResourceLoader,
    public_role: String,
    tenant_header: Option<String>,
    viewers: RwLock<HashMap<String, Arc<MapViewer>>>,
}

impl ViewerRegistry {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            loader: ResourceLoader::new(&config.tenants.config_path),
            public_role: config.tenants.public_role.clone(),
            tenant_header: config.tenants.tenant_header.clone(),
            viewers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_load(&self, tenant: &str) -> Result<Arc<MapViewer>, ResourceError> {
        // Fast path: already loaded
        {
            let viewers = self.viewers.read().await;
            if let Some(viewer) = viewers.get(tenant) {
                return Ok(viewer.clone());
            }
        }

        let mut viewers = self.viewers.write().await;
        // Double-check after acquiring write lock
        if let Some(viewer) = viewers.get(tenant) {
            return Ok(viewer.clone());
        }

        let viewer = MapViewer::load(&self.loader, tenant, &self.public_role)?
            .with_tenant_header(self.tenant_header.clone());
        let viewer = Arc::new(viewer);
        viewers.insert(tenant.to_string(), viewer.clone());
        Ok(viewer)
    }
}

pub fn router(state: AppState) -> Router {
    let viewer_routes = Router::new()
        .route("/", get(handlers::index))
        .route("/themes.json", get(handlers::themes))
        .route("/config.json", get(handlers::config))
        .route("/editConfig.json", get(handlers::edit_config))
        .route("/setuserinfo", get(handlers::set_user_info).post(handlers::set_user_info))
        .route("/assets/img/base64/*path", get(handlers::extracted_image))
        .layer(middleware::from_fn(no_cache_headers))
        .layer(middleware::from_fn_with_state(state.clone(), tenant_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), identity_middleware));

    // Probes stay reachable without a tenant
    let probes = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/ready", get(handlers::ready));

    let mut app = Router::new()
        .merge(viewer_routes)
        .merge(probes)
        .with_state(state.clone());

    if state.config.server.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if state.config.server.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let port = config.server.port;
    let state = AppState::new(config)?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Map viewer service listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
