use serde_json::{Map, Value};

use super::model::{MenuItem, Plugin, ViewerAppConfig, ViewerConfig};
use crate::config::ServiceConfig;
use crate::identity::Identity;
use crate::permissions::{PermissionClient, PermissionError, PermissionResolver};

const DEFAULT_WMS_DPI: &str = "96";

/// Request-dependent inputs of `config.json`
#[derive(Debug, Clone, Default)]
pub struct ConfigRequest<'a> {
    pub tenant: Option<&'a str>,
    /// `autologin` request parameter present
    pub autologin: bool,
    pub user_infos: Map<String, Value>,
    /// Stored value of the display user info field
    pub display_name: Option<String>,
}

/// Sign-in state applied to Login/Logout menu entries
struct SignIn<'a> {
    username: Option<&'a str>,
    autologin: bool,
}

/// Viewer Config Assembler
pub struct ConfigAssembler<'a> {
    app: &'a ViewerAppConfig,
    services: &'a ServiceConfig,
    client: &'a dyn PermissionClient,
}

impl<'a> ConfigAssembler<'a> {
    pub fn new(
        app: &'a ViewerAppConfig,
        services: &'a ServiceConfig,
        client: &'a dyn PermissionClient,
    ) -> Self {
        Self {
            app,
            services,
            client,
        }
    }

    pub fn build(
        &self,
        identity: &Identity,
        request: ConfigRequest<'_>,
    ) -> Result<ViewerConfig, PermissionError> {
        let mut config = self.app.config.clone();

        for (key, url) in self.services.viewer_service_urls() {
            if !url.is_empty() {
                config.extra.insert(key.to_string(), Value::String(url.to_string()));
            }
        }
        match &self.services.wms_dpi {
            Some(dpi) => {
                config.extra.insert("wmsDpi".to_string(), Value::String(dpi.clone()));
            }
            None => {
                config
                    .extra
                    .entry("wmsDpi")
                    .or_insert_with(|| Value::String(DEFAULT_WMS_DPI.to_string()));
            }
        }

        let sign_in = SignIn {
            username: identity.username.as_deref(),
            autologin: identity.autologin || request.autologin,
        };
        let denied_tasks = self.denied_viewer_tasks(identity)?;

        if let Some(plugins) = config.plugins.as_mut() {
            for variant in plugins.variants_mut() {
                replace_login_in_plugins(variant, &sign_in);
                for task in &denied_tasks {
                    remove_viewer_task(variant, task);
                }
            }
        }

        config.username = request
            .display_name
            .or_else(|| {
                self.services
                    .display_user_info_field
                    .as_deref()
                    .and_then(|field| request.user_infos.get(field))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .or_else(|| identity.username.clone());
        config.tenant = request.tenant.map(str::to_string);
        config.user_infos = (!request.user_infos.is_empty()).then_some(request.user_infos);

        Ok(config)
    }

    /// Restricted viewer tasks not granted to the identity
    pub fn denied_viewer_tasks(&self, identity: &Identity) -> Result<Vec<String>, PermissionError> {
        if self.app.restricted_viewer_tasks.is_empty() {
            return Ok(Vec::new());
        }
        let permitted = PermissionResolver::new(self.client, identity).names("viewer_tasks")?;
        Ok(self
            .app
            .restricted_viewer_tasks
            .iter()
            .filter(|task| !permitted.contains(task))
            .cloned()
            .collect())
    }
}

fn replace_login_in_plugins(plugins: &mut [Plugin], sign_in: &SignIn<'_>) {
    for cfg in plugins.iter_mut().filter_map(|plugin| plugin.cfg.as_mut()) {
        for items in cfg.item_lists_mut() {
            replace_login(items, sign_in);
        }
    }
}

/// Turn the login entry into a logout entry for signed in users, or remove
/// it when the user was logged in automatically
fn replace_login(items: &mut Vec<MenuItem>, sign_in: &SignIn<'_>) {
    let mut remove = None;

    for (idx, item) in items.iter_mut().enumerate() {
        if item.has_key("Login") {
            item.key = Some("Authentication".to_string());
            item.mode = Some("Login".to_string());
        }

        if item.has_key("Authentication") {
            if let Some(username) = sign_in.username {
                if sign_in.autologin {
                    remove = Some(idx);
                    break;
                }
                item.mode = Some("Logout".to_string());
                item.icon = Some("logout".to_string());
                item.trargs = Some(vec![username.to_string()]);
            }
        } else if let Some(subitems) = item.subitems.as_mut() {
            replace_login(subitems, sign_in);
        }
    }

    if let Some(idx) = remove {
        items.remove(idx);
    }
}

fn remove_viewer_task(plugins: &mut Vec<Plugin>, task: &str) {
    plugins.retain(|plugin| {
        plugin.name.as_deref() != Some(task) && plugin.task_key().as_deref() != Some(task)
    });

    for cfg in plugins.iter_mut().filter_map(|plugin| plugin.cfg.as_mut()) {
        for items in cfg.item_lists_mut() {
            remove_menu_items(items, task);
        }
    }
}

fn remove_menu_items(items: &mut Vec<MenuItem>, task: &str) {
    items.retain(|item| item.task_key() != task);
    for subitems in items.iter_mut().filter_map(|item| item.subitems.as_mut()) {
        remove_menu_items(subitems, task);
    }
}
