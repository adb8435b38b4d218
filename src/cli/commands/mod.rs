pub mod config;
pub mod serve;
pub mod themes;

use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::identity::Identity;
use crate::resources::ResourceLoader;
use crate::viewer::MapViewer;

/// Tenant and identity to inspect documents for
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    #[arg(long, help = "Tenant name (default: DEFAULT_TENANT)")]
    pub tenant: Option<String>,

    #[arg(long, help = "Username; anonymous when omitted")]
    pub user: Option<String>,

    #[arg(long, help = "Identity group, i.e. an origin group")]
    pub group: Option<String>,
}

impl IdentityArgs {
    pub fn identity(&self) -> Identity {
        let mut identity = match &self.user {
            Some(user) => Identity::user(user.clone()),
            None => Identity::anonymous(),
        };
        identity.group = self.group.clone();
        identity
    }

    pub fn load_viewer(&self, config: &AppConfig) -> anyhow::Result<Arc<MapViewer>> {
        let tenant = self.tenant.as_deref().unwrap_or(&config.tenants.default_tenant);
        let loader = ResourceLoader::new(&config.tenants.config_path);
        let viewer = MapViewer::load(&loader, tenant, &config.tenants.public_role)?;
        Ok(Arc::new(viewer))
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
