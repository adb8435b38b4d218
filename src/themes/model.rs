//! Typed theme catalog (`themes.json`).
//!
//! Only the keys the filter engine reads or rewrites are typed. Everything
//! else is carried through untouched in the flattened `extra` maps, and absent
//! optional keys stay absent on output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Item keys describing print support, removed when no template is permitted
pub const PRINT_KEYS: [&str; 5] = [
    "printScales",
    "printResolutions",
    "printGrid",
    "printLabelConfig",
    "printLabelForSearchResult",
];

/// Group of themes; the catalog root is a group carrying the tree-wide lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeGroup {
    #[serde(default)]
    pub items: Vec<ThemeItem>,
    #[serde(default)]
    pub subdirs: Vec<ThemeGroup>,
    #[serde(rename = "backgroundLayers", default, skip_serializing_if = "Option::is_none")]
    pub background_layers: Option<Vec<NamedEntry>>,
    #[serde(rename = "externalLayers", default, skip_serializing_if = "Option::is_none")]
    pub external_layers: Option<Vec<NamedEntry>>,
    #[serde(rename = "themeInfoLinks", default, skip_serializing_if = "Option::is_none")]
    pub theme_info_links: Option<Vec<NamedEntry>>,
    #[serde(rename = "pluginData", default, skip_serializing_if = "Option::is_none")]
    pub plugin_data: Option<BTreeMap<String, Vec<NamedEntry>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThemeGroup {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.subdirs.is_empty()
    }

    /// Depth-first iterator over all items of this group and its subgroups
    pub fn all_items(&self) -> Box<dyn Iterator<Item = &ThemeItem> + '_> {
        Box::new(
            self.items
                .iter()
                .chain(self.subdirs.iter().flat_map(|group| group.all_items())),
        )
    }

    pub(crate) fn all_items_mut(&mut self) -> Vec<&mut ThemeItem> {
        let mut items: Vec<&mut ThemeItem> = self.items.iter_mut().collect();
        for group in self.subdirs.iter_mut() {
            items.extend(group.all_items_mut());
        }
        items
    }
}

/// A single theme
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wms_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Set on placeholders standing in for a denied theme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "featureInfoUrl", default, skip_serializing_if = "Option::is_none")]
    pub feature_info_url: Option<String>,
    #[serde(rename = "legendUrl", default, skip_serializing_if = "Option::is_none")]
    pub legend_url: Option<String>,
    #[serde(rename = "printUrl", default, skip_serializing_if = "Option::is_none")]
    pub print_url: Option<String>,
    #[serde(rename = "extraLegendParameters", default, skip_serializing_if = "Option::is_none")]
    pub extra_legend_parameters: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublayers: Option<Vec<Layer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<Vec<NamedEntry>>,
    #[serde(rename = "editConfig", default, skip_serializing_if = "Option::is_none")]
    pub edit_config: Option<BTreeMap<String, EditDataset>>,
    #[serde(rename = "backgroundLayers", default, skip_serializing_if = "Option::is_none")]
    pub background_layers: Option<Vec<NamedEntry>>,
    #[serde(rename = "searchProviders", default, skip_serializing_if = "Option::is_none")]
    pub search_providers: Option<Vec<SearchProvider>>,
    #[serde(rename = "externalLayers", default, skip_serializing_if = "Option::is_none")]
    pub external_layers: Option<Vec<ExternalLayerRef>>,
    #[serde(rename = "themeInfoLinks", default, skip_serializing_if = "Option::is_none")]
    pub theme_info_links: Option<ThemeInfoLinks>,
    #[serde(rename = "pluginData", default, skip_serializing_if = "Option::is_none")]
    pub plugin_data: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapping: Option<Snapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map3d: Option<Map3d>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThemeItem {
    /// Minimal stand-in for a theme the identity may not open
    pub fn restricted_placeholder(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            restricted: Some(true),
            ..Self::default()
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted == Some(true)
    }
}

/// Layer or group layer of a theme's layer tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublayers: Option<Vec<Layer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchterms: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Layer {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn is_group(&self) -> bool {
        self.sublayers.as_ref().map_or(false, |layers| !layers.is_empty())
    }
}

/// Any list entry identified by `name` (print templates, background layers,
/// catalog external layers, info links, plugin resources, 3D tilesets)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NamedEntry {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            extra: Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Edit form configuration of one dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditDataset {
    #[serde(rename = "editDataset", default, skip_serializing_if = "Option::is_none")]
    pub edit_dataset: Option<String>,
    #[serde(default)]
    pub fields: Vec<EditField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<EditPermissions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPermissions {
    #[serde(default)]
    pub creatable: bool,
    #[serde(default)]
    pub updatable: bool,
    #[serde(default)]
    pub deletable: bool,
}

/// Entry of `searchProviders`: a provider name or a provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchProvider {
    Name(String),
    Config(SearchProviderConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Legacy top-level facet list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Vec<String>>,
    /// Legacy top-level layer name to facet mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<FacetParams>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchProviderConfig {
    pub fn is_fulltext(&self) -> bool {
        matches!(self.provider.as_deref(), Some("solr") | Some("fulltext"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalLayerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "internalLayer", default, skip_serializing_if = "Option::is_none")]
    pub internal_layer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeInfoLinks {
    #[serde(default)]
    pub entries: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snaplayers: Option<Vec<NamedEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Map3d {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles3d: Option<Vec<NamedEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response body of `/themes.json`
#[derive(Debug, Clone, Serialize)]
pub struct ThemesDocument {
    pub themes: ThemeGroup,
}
