pub mod thumbnails;

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::permissions::PermissionError;
use crate::themes::ThemeGroup;
use crate::viewer::model::ViewerAppConfig;

pub use thumbnails::{ThumbnailExtractor, BASE64_IMAGE_ROUTE_PREFIX, DEFAULT_THUMBNAIL_IMAGE};

pub const VIEWER_CONFIG_FILE: &str = "mapViewerConfig.json";
pub const PERMISSIONS_FILE: &str = "permissions.json";
pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Unknown tenant '{0}'")]
    UnknownTenant(String),

    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Viewer index not found: {0}")]
    IndexNotFound(PathBuf),

    #[error(transparent)]
    Permissions(#[from] PermissionError),
}

#[derive(Debug, Default, Deserialize)]
struct MapViewerDocument {
    #[serde(default)]
    config: Value,
    #[serde(default)]
    resources: ResourcesSection,
}

#[derive(Debug, Default, Deserialize)]
struct ResourcesSection {
    #[serde(default)]
    qwc2_config: ViewerAppConfig,
    #[serde(default)]
    qwc2_themes: ThemesSection,
}

#[derive(Debug, Default, Deserialize)]
struct ThemesSection {
    #[serde(default)]
    themes: ThemeGroup,
}

/// Loaded, read-only documents of one tenant
#[derive(Debug)]
pub struct TenantResources {
    pub services: ServiceConfig,
    pub viewer: ViewerAppConfig,
    pub themes: ThemeGroup,
    pub config_dir: PathBuf,
    /// Extracted thumbnails; removed from disk when dropped
    pub thumbnails: Option<TempDir>,
}

impl TenantResources {
    /// Resources built in memory, without a config directory or thumbnails
    pub fn new(services: ServiceConfig, viewer: ViewerAppConfig, themes: ThemeGroup) -> Self {
        Self {
            services,
            viewer,
            themes,
            config_dir: PathBuf::new(),
            thumbnails: None,
        }
    }

    pub fn index_file(&self) -> PathBuf {
        self.config_dir.join(INDEX_FILE)
    }

    /// On-disk location of an extracted image, given its path below
    /// `img/base64/`
    pub fn extracted_image(&self, relative: &str) -> Option<PathBuf> {
        let dir = self.thumbnails.as_ref()?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return None;
        }
        Some(dir.path().join(relative))
    }
}

/// Reads tenant documents below the config root
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    config_root: PathBuf,
}

impl ResourceLoader {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    /// Config directory of a tenant; the name must be a plain directory name
    pub fn tenant_dir(&self, tenant: &str) -> Result<PathBuf, ResourceError> {
        let valid = !tenant.is_empty()
            && !tenant.starts_with('.')
            && tenant
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        let dir = self.config_root.join(tenant);
        if !valid || !dir.is_dir() {
            return Err(ResourceError::UnknownTenant(tenant.to_string()));
        }
        Ok(dir)
    }

    pub fn permissions_file(&self, tenant: &str) -> Result<PathBuf, ResourceError> {
        Ok(self.tenant_dir(tenant)?.join(PERMISSIONS_FILE))
    }

    pub fn load(&self, tenant: &str) -> Result<TenantResources, ResourceError> {
        let config_dir = self.tenant_dir(tenant)?;
        let path = config_dir.join(VIEWER_CONFIG_FILE);

        let content = std::fs::read_to_string(&path).map_err(|source| ResourceError::Io {
            path: path.clone(),
            source,
        })?;
        let document: MapViewerDocument =
            serde_json::from_str(&content).map_err(|source| ResourceError::Parse {
                path: path.clone(),
                source,
            })?;

        let services = ServiceConfig::from_value(&document.config);
        let mut themes = document.resources.qwc2_themes.themes;

        let mut extractor = ThumbnailExtractor::new();
        extractor.extract_catalog(&mut themes);

        tracing::info!(
            "Loaded viewer resources for tenant '{}' ({} theme(s))",
            tenant,
            themes.all_items().count()
        );

        Ok(TenantResources {
            services,
            viewer: document.resources.qwc2_config,
            themes,
            config_dir,
            thumbnails: extractor.into_dir(),
        })
    }
}
