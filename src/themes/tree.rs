//! Catalog-wide passes, run after item pruning: catalog lists only keep the
//! entries still referenced by a surviving item.

use std::collections::{BTreeMap, BTreeSet};

use super::model::ThemeGroup;

pub fn filter_external_layers(themes: &mut ThemeGroup) {
    let Some(layers) = themes.external_layers.take() else {
        return;
    };
    let used: BTreeSet<&str> = themes
        .all_items()
        .filter_map(|item| item.external_layers.as_ref())
        .flatten()
        .filter_map(|layer| layer.name.as_deref())
        .collect();

    let layers = layers
        .into_iter()
        .filter(|layer| used.contains(layer.name()))
        .collect();
    themes.external_layers = Some(layers);
}

pub fn filter_theme_info_links(themes: &mut ThemeGroup) {
    let Some(links) = themes.theme_info_links.take() else {
        return;
    };
    let used: BTreeSet<&str> = themes
        .all_items()
        .filter_map(|item| item.theme_info_links.as_ref())
        .flat_map(|links| links.entries.iter().map(String::as_str))
        .collect();

    let links = links
        .into_iter()
        .filter(|link| used.contains(link.name()))
        .collect();
    themes.theme_info_links = Some(links);
}

pub fn filter_plugin_data(themes: &mut ThemeGroup) {
    let Some(plugin_data) = themes.plugin_data.take() else {
        return;
    };

    let mut used: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for item_data in themes.all_items().filter_map(|item| item.plugin_data.as_ref()) {
        for (plugin, resources) in item_data {
            used.entry(plugin.as_str())
                .or_default()
                .extend(resources.iter().map(String::as_str));
        }
    }

    let filtered = plugin_data
        .into_iter()
        .filter_map(|(plugin, resources)| {
            let used = used.get(plugin.as_str())?;
            let resources: Vec<_> = resources
                .into_iter()
                .filter(|resource| used.contains(resource.name()))
                .collect();
            (!resources.is_empty()).then_some((plugin, resources))
        })
        .collect();
    themes.plugin_data = Some(filtered);
}
