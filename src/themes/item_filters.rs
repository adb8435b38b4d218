//! Per-item pruning steps. Each step works on an owned copy of an item and
//! takes the already resolved permissions it depends on.

use serde_json::Map;
use std::collections::{BTreeMap, BTreeSet};

use super::model::{
    EditDataset, EditPermissions, Layer, NamedEntry, SearchProvider, ThemeItem, PRINT_KEYS,
};
use crate::permissions::{DatasetPermission, NameSet, PluginDataPermission};

/// Keep only permitted sublayers, recursing into group layers. Groups whose
/// children are all denied stay in the tree with an empty sublayer list.
pub fn prune_layers(layers: Vec<Layer>, permitted: &BTreeSet<String>) -> Vec<Layer> {
    layers
        .into_iter()
        .filter(|layer| layer.name.as_ref().map_or(false, |name| permitted.contains(name)))
        .map(|mut layer| {
            if layer.is_group() {
                layer.sublayers = layer.sublayers.take().map(|sub| prune_layers(sub, permitted));
            }
            layer
        })
        .collect()
}

pub fn filter_print_templates(item: &mut ThemeItem, permitted: &BTreeSet<String>) {
    let templates: Vec<NamedEntry> = item
        .print
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|template| permitted.contains(template.name()))
        .collect();

    if !templates.is_empty() {
        item.print = Some(templates);
        return;
    }

    item.print_url = None;
    for key in PRINT_KEYS {
        item.extra.remove(key);
    }
    if let Some(layers) = item.background_layers.as_mut() {
        for layer in layers.iter_mut() {
            layer.extra.remove("printLayer");
        }
    }
}

/// Dataset identifier of an edit config entry
pub fn dataset_id(wms_name: &str, layer: &str, dataset: &EditDataset) -> String {
    dataset
        .edit_dataset
        .clone()
        .unwrap_or_else(|| format!("{}.{}", wms_name, layer))
}

/// Restrict a dataset config to the permitted attributes and CRUD flags
pub fn permitted_dataset(mut dataset: EditDataset, permission: &DatasetPermission) -> EditDataset {
    dataset.fields.retain(|field| {
        field
            .id
            .as_ref()
            .map_or(false, |id| permission.attributes.contains(id))
    });
    dataset.permissions = Some(EditPermissions {
        creatable: permission.creatable,
        updatable: permission.updatable,
        deletable: permission.deletable,
    });
    dataset
}

pub fn filter_named(entries: Vec<NamedEntry>, permitted: &NameSet) -> Vec<NamedEntry> {
    entries
        .into_iter()
        .filter(|entry| permitted.contains(entry.name()))
        .collect()
}

/// Normalize fulltext search providers and keep permitted facets only.
/// Returns whether the item has a fulltext provider.
pub fn filter_search_providers(providers: &mut [SearchProvider], facets: &NameSet) -> bool {
    let mut fulltext = false;

    for provider in providers.iter_mut() {
        let SearchProvider::Config(config) = provider else {
            continue;
        };
        if !config.is_fulltext() {
            continue;
        }
        fulltext = true;

        let mut params = config.params.take().unwrap_or_default();
        let default = params
            .default
            .take()
            .or_else(|| config.default.take())
            .unwrap_or_default();
        let layers = params
            .layers
            .take()
            .or_else(|| config.layers.take())
            .unwrap_or_default();

        params.default = Some(default.into_iter().filter(|facet| facets.contains(facet)).collect());
        params.layers = Some(
            layers
                .into_iter()
                .filter(|(_, facet)| facets.contains(facet))
                .collect(),
        );

        config.provider = Some("fulltext".to_string());
        config.default = None;
        config.layers = None;
        config.params = Some(params);
    }

    fulltext
}

/// Prune `searchterms` of leaf layers; drop the key when nothing is left
pub fn filter_searchterms(layers: &mut [Layer], facets: &NameSet) {
    for layer in layers.iter_mut() {
        if layer.is_group() {
            if let Some(sublayers) = layer.sublayers.as_mut() {
                filter_searchterms(sublayers, facets);
            }
            continue;
        }
        if let Some(terms) = layer.searchterms.take() {
            let terms: Vec<String> = terms.into_iter().filter(|t| facets.contains(t)).collect();
            if !terms.is_empty() {
                layer.searchterms = Some(terms);
            }
        }
    }
}

/// Item external layers must reference a permitted internal layer
pub fn filter_item_external_layers(item: &mut ThemeItem, permitted_layers: &BTreeSet<String>) {
    if let Some(layers) = item.external_layers.as_mut() {
        layers.retain(|layer| {
            layer
                .internal_layer
                .as_ref()
                .map_or(false, |name| permitted_layers.contains(name))
        });
    }
}

pub fn filter_theme_info_links(item: &mut ThemeItem, permitted: &NameSet) {
    if let Some(mut links) = item.theme_info_links.take() {
        links.entries.retain(|entry| permitted.contains(entry));
        if !links.entries.is_empty() {
            item.theme_info_links = Some(links);
        }
    }
}

pub fn filter_plugin_data(item: &mut ThemeItem, permission: Option<&PluginDataPermission>) {
    let Some(plugin_data) = item.plugin_data.take() else {
        return;
    };

    let filtered: BTreeMap<String, Vec<String>> = plugin_data
        .into_iter()
        .filter_map(|(plugin, resources)| {
            let permitted = permission?.resources(&plugin)?;
            let resources: Vec<String> = resources
                .into_iter()
                .filter(|resource| permitted.contains(resource))
                .collect();
            (!resources.is_empty()).then_some((plugin, resources))
        })
        .collect();

    if !filtered.is_empty() {
        item.plugin_data = Some(filtered);
    }
}

pub fn filter_snapping(item: &mut ThemeItem, permitted_layers: &BTreeSet<String>) {
    if let Some(snaplayers) = item.snapping.as_mut().and_then(|s| s.snaplayers.as_mut()) {
        snaplayers.retain(|entry| permitted_layers.contains(entry.name()));
    }
}

pub fn filter_tilesets(item: &mut ThemeItem, permitted: &NameSet) {
    if let Some(map3d) = item.map3d.as_mut() {
        if let Some(tiles) = map3d.tiles3d.take() {
            map3d.tiles3d = Some(filter_named(tiles, permitted));
        }
    }
}

/// Replace the translations mapping with the entry for `lang`
pub fn localize(item: &mut ThemeItem, lang: Option<&str>) {
    if let Some(translations) = item.translations.take() {
        let selected = lang
            .and_then(|lang| translations.get(lang))
            .and_then(|entry| entry.as_object())
            .cloned()
            .unwrap_or_else(Map::new);
        item.translations = Some(selected);
    }
}
