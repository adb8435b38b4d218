use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `qwc2_config` resource of a tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerAppConfig {
    #[serde(default)]
    pub config: ViewerConfig,
    /// Viewer tasks shown only when granted through `viewer_tasks`
    #[serde(default)]
    pub restricted_viewer_tasks: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Viewer application config (`config.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginsConfig>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_infos: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<Vec<Plugin>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<Vec<Plugin>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<Vec<Plugin>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginsConfig {
    pub fn variants_mut(&mut self) -> impl Iterator<Item = &mut Vec<Plugin>> {
        [&mut self.common, &mut self.mobile, &mut self.desktop]
            .into_iter()
            .filter_map(Option::as_mut)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg: Option<PluginCfg>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plugin {
    /// Task opened by a `TaskButton` plugin, with its mode appended
    pub fn task_key(&self) -> Option<String> {
        if self.name.as_deref() != Some("TaskButton") {
            return None;
        }
        let cfg = self.cfg.as_ref()?;
        let task = cfg.task.as_deref()?;
        Some(format!("{}{}", task, cfg.mode.as_deref().unwrap_or_default()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginCfg {
    #[serde(rename = "menuItems", default, skip_serializing_if = "Option::is_none")]
    pub menu_items: Option<Vec<MenuItem>>,
    #[serde(rename = "toolbarItems", default, skip_serializing_if = "Option::is_none")]
    pub toolbar_items: Option<Vec<MenuItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginCfg {
    pub fn item_lists_mut(&mut self) -> impl Iterator<Item = &mut Vec<MenuItem>> {
        [&mut self.menu_items, &mut self.toolbar_items]
            .into_iter()
            .filter_map(Option::as_mut)
    }
}

/// Entry of a menu or toolbar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trargs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subitems: Option<Vec<MenuItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MenuItem {
    pub fn has_key(&self, key: &str) -> bool {
        self.key.as_deref() == Some(key)
    }

    /// Item key with its mode appended, as used for viewer task names
    pub fn task_key(&self) -> String {
        format!(
            "{}{}",
            self.key.as_deref().unwrap_or_default(),
            self.mode.as_deref().unwrap_or_default()
        )
    }
}
