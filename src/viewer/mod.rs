pub mod assembler;
pub mod index;
pub mod model;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::database::{PgUserInfoStore, UserInfoError, UserInfoStore};
use crate::identity::Identity;
use crate::permissions::{PermissionClient, PermissionError, PermissionsReader};
use crate::resources::{ResourceError, ResourceLoader, TenantResources};
use crate::themes::{apply_service_urls, EditDataset, PermittedThemes, ThemeFilter, ThemesDocument};

pub use assembler::{ConfigAssembler, ConfigRequest};
pub use index::{IndexRequest, IndexResponse};
pub use model::{ViewerAppConfig, ViewerConfig};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    UserInfo(#[from] UserInfoError),
}

/// Result of `/setuserinfo`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserInfoUpdate {
    pub success: bool,
    pub fields: Map<String, Value>,
    pub error: Option<String>,
}

impl UserInfoUpdate {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Map::new(),
            error: Some(error.into()),
        }
    }
}

/// Viewer service of one tenant
pub struct MapViewer {
    tenant: String,
    resources: TenantResources,
    permissions: Box<dyn PermissionClient>,
    user_info: Option<Arc<dyn UserInfoStore>>,
    /// Header forwarded with the tenant name to the permalink service
    tenant_header: Option<String>,
    http: reqwest::Client,
}

impl MapViewer {
    pub fn new(
        tenant: impl Into<String>,
        resources: TenantResources,
        permissions: Box<dyn PermissionClient>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            resources,
            permissions,
            user_info: None,
            tenant_header: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_user_info_store(mut self, store: Arc<dyn UserInfoStore>) -> Self {
        self.user_info = Some(store);
        self
    }

    /// Load documents and permissions of a tenant from the config root
    pub fn load(loader: &ResourceLoader, tenant: &str, public_role: &str) -> Result<Self, ResourceError> {
        let resources = loader.load(tenant)?;
        let permissions = PermissionsReader::load(&loader.permissions_file(tenant)?, public_role)?;

        let user_info = resources.services.db_url.as_ref().map(|db_url| {
            Arc::new(PgUserInfoStore::new(
                db_url.clone(),
                resources.services.qwc_config_schema.clone(),
                &resources.services.user_info_fields,
            )) as Arc<dyn UserInfoStore>
        });

        let mut viewer = Self::new(tenant, resources, Box::new(permissions));
        viewer.user_info = user_info;
        Ok(viewer)
    }

    pub fn with_tenant_header(mut self, header: Option<String>) -> Self {
        self.tenant_header = header;
        self
    }

    fn theme_filter<'a>(&'a self, identity: &'a Identity) -> ThemeFilter<'a> {
        ThemeFilter::new(self.permissions.as_ref(), identity, &self.resources.services)
    }

    pub fn permitted_themes(&self, identity: &Identity) -> Result<PermittedThemes, PermissionError> {
        self.theme_filter(identity).permitted_themes(&self.resources.themes)
    }

    /// `themes.json` for an identity
    pub fn themes(&self, identity: &Identity, lang: Option<&str>) -> Result<ThemesDocument, PermissionError> {
        let PermittedThemes { mut themes, .. } = self
            .theme_filter(identity)
            .with_lang(lang)
            .permitted_themes(&self.resources.themes)?;
        apply_service_urls(&mut themes, &self.resources.services);
        Ok(ThemesDocument { themes })
    }

    /// `config.json` for an identity
    pub async fn config(&self, identity: &Identity, autologin: bool) -> Result<ViewerConfig, ViewerError> {
        let user_infos = self.user_infos(identity).await?;
        let display_name = self.display_name(identity).await?;
        let request = ConfigRequest {
            tenant: Some(&self.tenant),
            autologin,
            user_infos,
            display_name,
        };
        let config = ConfigAssembler::new(
            &self.resources.viewer,
            &self.resources.services,
            self.permissions.as_ref(),
        )
        .build(identity, request)?;
        Ok(config)
    }

    /// Permitted edit datasets of a WMS, limited to `layers` when given
    pub fn edit_config(
        &self,
        identity: &Identity,
        map: &str,
        layers: &[String],
    ) -> Result<BTreeMap<String, EditDataset>, PermissionError> {
        let mut entries = BTreeMap::new();
        for item in self
            .resources
            .themes
            .all_items()
            .filter(|item| item.wms_name.as_deref() == Some(map))
        {
            for (layer, dataset) in item.edit_config.iter().flatten() {
                if layers.is_empty() || layers.contains(layer) {
                    entries.entry(layer.clone()).or_insert_with(|| dataset.clone());
                }
            }
        }
        self.theme_filter(identity).permitted_edit_config(map, entries)
    }

    /// Stored profile fields merged with those carried by the identity
    pub async fn user_infos(&self, identity: &Identity) -> Result<Map<String, Value>, UserInfoError> {
        let mut infos = match (&self.user_info, identity.username.as_deref()) {
            (Some(store), Some(username)) => store.user_infos(username).await?,
            _ => Map::new(),
        };
        infos.extend(identity.user_infos.clone());
        Ok(infos)
    }

    /// Stored value of the display user info field, which need not be whitelisted
    async fn display_name(&self, identity: &Identity) -> Result<Option<String>, UserInfoError> {
        let field = self.resources.services.display_user_info_field.as_deref();
        match (&self.user_info, identity.username.as_deref(), field) {
            (Some(store), Some(username), Some(field)) => store.display_name(username, field).await,
            _ => Ok(None),
        }
    }

    /// Store the given profile fields. Any key outside the whitelist rejects the whole request.
    pub async fn set_user_info(
        &self,
        identity: &Identity,
        params: &BTreeMap<String, String>,
    ) -> Result<UserInfoUpdate, ViewerError> {
        if params.is_empty() {
            return Ok(UserInfoUpdate::failed("Empty query"));
        }
        let Some(username) = identity.username.as_deref() else {
            return Ok(UserInfoUpdate::failed("Not signed in"));
        };
        let Some(store) = &self.user_info else {
            return Ok(UserInfoUpdate::failed("User info storage not configured"));
        };

        let disallowed: Vec<&str> = params
            .keys()
            .filter(|key| !store.fields().contains(key))
            .map(String::as_str)
            .collect();
        if !disallowed.is_empty() {
            tracing::warn!("Rejected user info update of '{}': {:?}", username, disallowed);
            return Ok(UserInfoUpdate::failed(format!(
                "Disallowed fields: {}",
                disallowed.join(",")
            )));
        }

        let fields: Map<String, Value> = params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        match store.update_user_infos(username, &fields).await {
            Ok(()) => Ok(UserInfoUpdate {
                success: true,
                fields,
                error: None,
            }),
            Err(UserInfoError::UnknownUser(user)) => {
                Ok(UserInfoUpdate::failed(format!("User '{}' not found", user)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Location of an extracted thumbnail image
    pub fn extracted_image(&self, relative: &str) -> Option<PathBuf> {
        self.resources.extracted_image(relative)
    }
}
