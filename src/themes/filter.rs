use once_cell::unsync::OnceCell;
use std::collections::BTreeMap;

use super::item_filters;
use super::model::{EditDataset, ThemeGroup, ThemeItem};
use super::tree;
use crate::config::ServiceConfig;
use crate::identity::Identity;
use crate::permissions::{
    DatasetPermission, NameSet, PermissionClient, PermissionError, PermissionResolver,
    PluginDataPermission, WmsPermission,
};

/// Result of filtering the catalog for one identity
#[derive(Debug, Clone)]
pub struct PermittedThemes {
    pub themes: ThemeGroup,
    /// Ids of permitted items in tree order, placeholders excluded
    pub permitted_ids: Vec<String>,
}

/// Theme Filter Engine.
///
/// Builds a new tree holding only what the identity may see. The catalog
/// passed in is only read. Scalar permission sets are looked up at most once
/// per filter instance.
pub struct ThemeFilter<'a> {
    resolver: PermissionResolver<'a>,
    settings: &'a ServiceConfig,
    lang: Option<&'a str>,
    background_layers: OnceCell<NameSet>,
    solr_facets: OnceCell<NameSet>,
    theme_info_links: OnceCell<NameSet>,
    tilesets_3d: OnceCell<NameSet>,
    plugin_data: OnceCell<Option<PluginDataPermission>>,
}

impl<'a> ThemeFilter<'a> {
    pub fn new(
        client: &'a dyn PermissionClient,
        identity: &'a Identity,
        settings: &'a ServiceConfig,
    ) -> Self {
        Self {
            resolver: PermissionResolver::new(client, identity),
            settings,
            lang: None,
            background_layers: OnceCell::new(),
            solr_facets: OnceCell::new(),
            theme_info_links: OnceCell::new(),
            tilesets_3d: OnceCell::new(),
            plugin_data: OnceCell::new(),
        }
    }

    pub fn with_lang(mut self, lang: Option<&'a str>) -> Self {
        self.lang = lang;
        self
    }

    pub fn permitted_themes(&self, catalog: &ThemeGroup) -> Result<PermittedThemes, PermissionError> {
        let mut permitted_ids = Vec::new();

        // The root group is kept even when empty
        let mut themes = self.filter_group_contents(catalog, &mut permitted_ids)?;

        // Tree-wide passes need the final set of surviving items
        if let Some(layers) = themes.background_layers.take() {
            themes.background_layers = Some(item_filters::filter_named(layers, self.background_layers()?));
        }
        tree::filter_external_layers(&mut themes);
        tree::filter_theme_info_links(&mut themes);
        tree::filter_plugin_data(&mut themes);

        tracing::debug!(
            "{} permitted theme(s) for {:?}",
            permitted_ids.len(),
            self.resolver.identity().username
        );
        Ok(PermittedThemes {
            themes,
            permitted_ids,
        })
    }

    fn filter_group(
        &self,
        group: &ThemeGroup,
        permitted_ids: &mut Vec<String>,
    ) -> Result<Option<ThemeGroup>, PermissionError> {
        let filtered = self.filter_group_contents(group, permitted_ids)?;
        Ok((!filtered.is_empty()).then_some(filtered))
    }

    fn filter_group_contents(
        &self,
        group: &ThemeGroup,
        permitted_ids: &mut Vec<String>,
    ) -> Result<ThemeGroup, PermissionError> {
        let mut items = Vec::with_capacity(group.items.len());
        for item in &group.items {
            match self.permitted_item(item)? {
                Some(permitted) => {
                    if let Some(id) = &permitted.id {
                        permitted_ids.push(id.clone());
                    }
                    items.push(permitted);
                }
                None => {
                    if let Some(placeholder) = self.restricted_placeholder(item) {
                        items.push(placeholder);
                    }
                }
            }
        }

        let mut subdirs = Vec::with_capacity(group.subdirs.len());
        for subgroup in &group.subdirs {
            if let Some(filtered) = self.filter_group(subgroup, permitted_ids)? {
                subdirs.push(filtered);
            }
        }

        Ok(ThemeGroup {
            items,
            subdirs,
            background_layers: group.background_layers.clone(),
            external_layers: group.external_layers.clone(),
            theme_info_links: group.theme_info_links.clone(),
            plugin_data: group.plugin_data.clone(),
            extra: group.extra.clone(),
        })
    }

    fn restricted_placeholder(&self, item: &ThemeItem) -> Option<ThemeItem> {
        if !self.settings.show_restricted_themes {
            return None;
        }
        let whitelist = &self.settings.show_restricted_themes_whitelist;
        if !whitelist.is_empty()
            && !item.name.as_ref().map_or(false, |name| whitelist.contains(name))
        {
            return None;
        }
        Some(item.restricted_placeholder())
    }

    /// Filtered copy of a theme item, `None` if its WMS is not permitted
    pub fn permitted_item(&self, item: &ThemeItem) -> Result<Option<ThemeItem>, PermissionError> {
        let Some(wms_name) = item.wms_name.as_deref().filter(|name| !name.is_empty()) else {
            tracing::debug!("Theme item {:?} has no wms_name", item.id);
            return Ok(None);
        };
        let Some(wms) = self.resolver.merged::<WmsPermission>(Some(wms_name))? else {
            tracing::debug!("WMS '{}' not permitted", wms_name);
            return Ok(None);
        };

        let mut item = item.clone();

        if let Some(sublayers) = item.sublayers.take() {
            item.sublayers = Some(item_filters::prune_layers(sublayers, &wms.layers));
        }
        item_filters::filter_print_templates(&mut item, &wms.print_templates);

        if let Some(entries) = item.edit_config.take() {
            item.edit_config = Some(if entries.is_empty() {
                entries
            } else {
                self.permitted_edit_config(wms_name, entries)?
            });
        }

        if let Some(layers) = item.background_layers.take() {
            item.background_layers = Some(if layers.is_empty() {
                layers
            } else {
                item_filters::filter_named(layers, self.background_layers()?)
            });
        }

        if let Some(providers) = item.search_providers.as_mut() {
            let facets = self.solr_facets()?;
            if item_filters::filter_search_providers(providers, facets) {
                if let Some(sublayers) = item.sublayers.as_mut() {
                    item_filters::filter_searchterms(sublayers, facets);
                }
            }
        }

        item_filters::filter_item_external_layers(&mut item, &wms.layers);
        if item.theme_info_links.is_some() {
            item_filters::filter_theme_info_links(&mut item, self.theme_info_links()?);
        }
        if item.plugin_data.is_some() {
            item_filters::filter_plugin_data(&mut item, self.plugin_data()?.as_ref());
        }
        item_filters::filter_snapping(&mut item, &wms.layers);
        if item.map3d.is_some() {
            item_filters::filter_tilesets(&mut item, self.tilesets_3d()?);
        }
        item_filters::localize(&mut item, self.lang);

        Ok(Some(item))
    }

    /// Keep the permitted datasets of an edit config, restricted to their
    /// permitted fields and CRUD flags
    pub fn permitted_edit_config(
        &self,
        wms_name: &str,
        entries: BTreeMap<String, EditDataset>,
    ) -> Result<BTreeMap<String, EditDataset>, PermissionError> {
        let mut permitted = BTreeMap::new();
        for (layer, dataset) in entries {
            let id = item_filters::dataset_id(wms_name, &layer, &dataset);
            match self.resolver.merged::<DatasetPermission>(Some(&id))? {
                Some(permission) => {
                    permitted.insert(layer, item_filters::permitted_dataset(dataset, &permission));
                }
                None => tracing::debug!("Dataset '{}' not permitted", id),
            }
        }
        Ok(permitted)
    }

    fn background_layers(&self) -> Result<&NameSet, PermissionError> {
        self.background_layers
            .get_or_try_init(|| self.resolver.names("background_layers"))
    }

    fn solr_facets(&self) -> Result<&NameSet, PermissionError> {
        self.solr_facets.get_or_try_init(|| self.resolver.names("solr_facets"))
    }

    fn theme_info_links(&self) -> Result<&NameSet, PermissionError> {
        self.theme_info_links
            .get_or_try_init(|| self.resolver.names("theme_info_links"))
    }

    fn tilesets_3d(&self) -> Result<&NameSet, PermissionError> {
        self.tilesets_3d.get_or_try_init(|| self.resolver.names("tilesets_3d"))
    }

    fn plugin_data(&self) -> Result<&Option<PluginDataPermission>, PermissionError> {
        self.plugin_data
            .get_or_try_init(|| self.resolver.merged::<PluginDataPermission>(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionsReader;
    use serde_json::{json, Value};

    fn catalog(value: Value) -> ThemeGroup {
        serde_json::from_value(value).unwrap()
    }

    fn permissions(roles: Value) -> PermissionsReader {
        PermissionsReader::from_value(
            json!({"users": [{"name": "alice", "roles": ["user"]}], "roles": roles}),
            "public",
        )
        .unwrap()
    }

    fn filter(
        reader: &PermissionsReader,
        identity: &Identity,
        settings: &ServiceConfig,
        catalog: &ThemeGroup,
    ) -> PermittedThemes {
        ThemeFilter::new(reader, identity, settings)
            .permitted_themes(catalog)
            .unwrap()
    }

    #[test]
    fn denied_sublayers_are_removed() {
        let reader = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks", "layers": [{"name": "parks"}, {"name": "trees"}]}]
        }}]));
        let catalog = catalog(json!({"items": [{
            "id": "parks", "name": "parks", "wms_name": "parks",
            "sublayers": [{"name": "trees"}, {"name": "benches"}]
        }]}));

        let result = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert_eq!(result.permitted_ids, vec!["parks"]);
        assert_eq!(
            serde_json::to_value(&result.themes.items[0].sublayers).unwrap(),
            json!([{"name": "trees"}])
        );
    }

    #[test]
    fn denied_item_becomes_placeholder_when_enabled() {
        let reader = permissions(json!([]));
        let catalog = catalog(json!({"items": [{
            "id": "restricted", "name": "restricted", "title": "Restricted",
            "thumbnail": "img/r.png", "wms_name": "restricted", "sublayers": [{"name": "x"}]
        }]}));

        let hidden = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert!(hidden.themes.items.is_empty());

        let settings = ServiceConfig {
            show_restricted_themes: true,
            ..ServiceConfig::default()
        };
        let shown = filter(&reader, &Identity::anonymous(), &settings, &catalog);
        assert!(shown.permitted_ids.is_empty());
        assert_eq!(
            serde_json::to_value(&shown.themes.items).unwrap(),
            json!([{"id": "restricted", "name": "restricted", "title": "Restricted",
                    "thumbnail": "img/r.png", "restricted": true}])
        );
    }

    #[test]
    fn placeholder_whitelist_limits_placeholders() {
        let reader = permissions(json!([]));
        let catalog = catalog(json!({"items": [
            {"id": "a", "name": "a", "wms_name": "a"},
            {"id": "b", "name": "b", "wms_name": "b"}
        ]}));
        let settings = ServiceConfig {
            show_restricted_themes: true,
            show_restricted_themes_whitelist: vec!["b".to_string()],
            ..ServiceConfig::default()
        };
        let result = filter(&reader, &Identity::anonymous(), &settings, &catalog);
        assert_eq!(result.themes.items.len(), 1);
        assert_eq!(result.themes.items[0].name.as_deref(), Some("b"));
        assert!(result.themes.items[0].is_restricted());
    }

    #[test]
    fn empty_groups_collapse_but_root_stays() {
        let reader = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "open", "layers": []}]
        }}]));
        let catalog = catalog(json!({
            "items": [{"id": "closed", "wms_name": "closed"}],
            "subdirs": [
                {"title": "Empty", "items": [{"id": "c2", "wms_name": "closed"}],
                 "subdirs": [{"items": [{"id": "c3", "wms_name": "closed"}]}]},
                {"title": "Open", "items": [{"id": "o1", "wms_name": "open"}], "subdirs": []}
            ]
        }));

        let result = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert!(result.themes.items.is_empty());
        assert_eq!(result.themes.subdirs.len(), 1);
        assert_eq!(result.themes.subdirs[0].extra["title"], "Open");
        assert_eq!(result.permitted_ids, vec!["o1"]);

        let nothing = permissions(json!([]));
        let empty = filter(&nothing, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert!(empty.themes.is_empty());
    }

    #[test]
    fn background_layers_honor_wildcard() {
        let catalog = catalog(json!({
            "items": [{"id": "p", "wms_name": "parks",
                       "backgroundLayers": [{"name": "osm"}, {"name": "ortho"}]}],
            "backgroundLayers": [{"name": "osm"}, {"name": "ortho"}, {"name": "never_granted"}]
        }));
        let wildcard = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks"}],
            "background_layers": ["*"]
        }}]));
        let result = filter(&wildcard, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert_eq!(result.themes.background_layers.as_ref().unwrap().len(), 3);
        assert_eq!(result.themes.items[0].background_layers.as_ref().unwrap().len(), 2);

        let single = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks"}],
            "background_layers": ["osm"]
        }}]));
        let result = filter(&single, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert_eq!(
            serde_json::to_value(&result.themes.background_layers).unwrap(),
            json!([{"name": "osm"}])
        );
    }

    #[test]
    fn edit_config_merges_dataset_permissions() {
        let reader = permissions(json!([
            {"role": "public", "permissions": {
                "wms_services": [{"name": "parks", "layers": [{"name": "trees"}]}],
                "data_datasets": [{"name": "parks.trees", "attributes": ["a"], "writable": false}]
            }},
            {"role": "user", "permissions": {
                "data_datasets": [{"name": "parks.trees", "attributes": ["b"],
                                   "creatable": true, "updatable": true, "deletable": true}]
            }}
        ]));
        let catalog = catalog(json!({"items": [{
            "id": "parks", "wms_name": "parks",
            "editConfig": {
                "trees": {"fields": [{"id": "a"}, {"id": "b"}, {"id": "c"}]},
                "benches": {"fields": [{"id": "a"}]}
            }
        }]}));

        let alice = Identity::user("alice");
        let result = filter(&reader, &alice, &ServiceConfig::default(), &catalog);
        let edit = serde_json::to_value(&result.themes.items[0].edit_config).unwrap();
        assert_eq!(
            edit,
            json!({"trees": {
                "fields": [{"id": "a"}, {"id": "b"}],
                "permissions": {"creatable": true, "updatable": true, "deletable": true}
            }})
        );

        let anonymous = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        let edit = serde_json::to_value(&anonymous.themes.items[0].edit_config).unwrap();
        assert_eq!(
            edit["trees"]["permissions"],
            json!({"creatable": false, "updatable": false, "deletable": false})
        );
    }

    #[test]
    fn edit_config_without_datasets_is_empty_mapping() {
        let reader = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks"}]
        }}]));
        let catalog = catalog(json!({"items": [{
            "id": "parks", "wms_name": "parks", "editConfig": {"trees": {"fields": []}}
        }]}));
        let result = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert_eq!(
            serde_json::to_value(&result.themes.items[0]).unwrap()["editConfig"],
            json!({})
        );
    }

    #[test]
    fn catalog_lists_keep_only_referenced_entries() {
        let reader = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks", "layers": [{"name": "ext_trees"}]}],
            "theme_info_links": ["parks_info"],
            "plugin_data": [{"name": "Redlining", "resources": ["symbols"]}]
        }}]));
        let catalog = catalog(json!({
            "items": [
                {"id": "parks", "wms_name": "parks",
                 "externalLayers": [
                     {"name": "wms:trees", "internalLayer": "ext_trees"},
                     {"name": "wms:pipes", "internalLayer": "ext_pipes"}
                 ],
                 "themeInfoLinks": {"entries": ["parks_info", "secret_info"]},
                 "pluginData": {"Redlining": ["symbols", "arrows"]}},
                {"id": "secret", "wms_name": "secret",
                 "externalLayers": [{"name": "wms:secret", "internalLayer": "s"}],
                 "themeInfoLinks": {"entries": ["secret_info"]}}
            ],
            "externalLayers": [{"name": "wms:trees"}, {"name": "wms:pipes"}, {"name": "wms:secret"}],
            "themeInfoLinks": [{"name": "parks_info"}, {"name": "secret_info"}],
            "pluginData": {
                "Redlining": [{"name": "symbols"}, {"name": "arrows"}],
                "Routing": [{"name": "bike"}]
            }
        }));

        let result = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        let themes = serde_json::to_value(&result.themes).unwrap();
        assert_eq!(themes["externalLayers"], json!([{"name": "wms:trees"}]));
        assert_eq!(themes["themeInfoLinks"], json!([{"name": "parks_info"}]));
        assert_eq!(themes["pluginData"], json!({"Redlining": [{"name": "symbols"}]}));
        assert_eq!(
            themes["items"][0]["externalLayers"],
            json!([{"name": "wms:trees", "internalLayer": "ext_trees"}])
        );
    }

    #[test]
    fn snapping_and_tilesets_are_filtered() {
        let reader = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks", "layers": [{"name": "trees"}]}],
            "tilesets_3d": ["buildings"]
        }}]));
        let catalog = catalog(json!({"items": [{
            "id": "parks", "wms_name": "parks",
            "snapping": {"snaplayers": [{"name": "trees", "min": 0, "max": 5000}, {"name": "benches"}],
                         "snaptooltip": true},
            "map3d": {"tiles3d": [{"name": "buildings"}, {"name": "trees3d"}], "dtm": "dtm.tif"}
        }]}));
        let result = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        let item = serde_json::to_value(&result.themes.items[0]).unwrap();
        assert_eq!(
            item["snapping"],
            json!({"snaplayers": [{"name": "trees", "min": 0, "max": 5000}], "snaptooltip": true})
        );
        assert_eq!(item["map3d"], json!({"tiles3d": [{"name": "buildings"}], "dtm": "dtm.tif"}));
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        let reader = permissions(json!([{"role": "public", "permissions": {
            "wms_services": [{"name": "parks", "layers": [{"name": "green"}, {"name": "trees"}],
                              "print_templates": ["A4"]}],
            "background_layers": ["osm"],
            "solr_facets": ["trees_facet"]
        }}]));
        let catalog = catalog(json!({
            "items": [
                {"id": "parks", "name": "parks", "wms_name": "parks",
                 "sublayers": [{"name": "green", "sublayers": [
                     {"name": "trees", "searchterms": ["trees_facet", "x"]},
                     {"name": "benches"}
                 ]}],
                 "print": [{"name": "A4"}, {"name": "A3"}],
                 "backgroundLayers": [{"name": "osm", "printLayer": "osm"}, {"name": "ortho"}],
                 "searchProviders": [{"provider": "solr", "default": ["trees_facet", "x"]}]},
                {"id": "closed", "name": "closed", "title": "Closed", "wms_name": "closed"}
            ],
            "subdirs": [{"items": [{"id": "c2", "wms_name": "closed"}]}],
            "backgroundLayers": [{"name": "osm"}, {"name": "ortho"}]
        }));
        let settings = ServiceConfig {
            show_restricted_themes: true,
            ..ServiceConfig::default()
        };

        let once = filter(&reader, &Identity::anonymous(), &settings, &catalog);
        let twice = filter(&reader, &Identity::anonymous(), &settings, &once.themes);
        assert_eq!(once.themes, twice.themes);
        assert_eq!(once.permitted_ids, twice.permitted_ids);
    }

    #[test]
    fn catalog_is_not_modified() {
        let reader = permissions(json!([]));
        let catalog = catalog(json!({"items": [{"id": "a", "wms_name": "a"}]}));
        let before = catalog.clone();
        let _ = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert_eq!(catalog, before);
    }

    #[test]
    fn permission_failure_fails_the_filter() {
        struct Failing;
        impl PermissionClient for Failing {
            fn resource_permissions(
                &self,
                _: &str,
                _: &Identity,
                _: Option<&str>,
            ) -> Result<Vec<Value>, PermissionError> {
                Err(PermissionError::Unavailable("down".to_string()))
            }
        }

        let catalog = catalog(json!({"items": [{"id": "a", "wms_name": "a"}]}));
        let identity = Identity::anonymous();
        let settings = ServiceConfig::default();
        let result = ThemeFilter::new(&Failing, &identity, &settings).permitted_themes(&catalog);
        assert!(matches!(result, Err(PermissionError::Unavailable(_))));
    }

    #[test]
    fn nested_item_below_denied_group_items_needs_sign_in() {
        let reader = permissions(json!([{"role": "user", "permissions": {
            "wms_services": [{"name": "staff_map", "layers": [{"name": "staff_map"}]}]
        }}]));
        let catalog = catalog(json!({
            "items": [],
            "subdirs": [{"title": "Outer", "items": [{"id": "closed", "wms_name": "closed"}],
                         "subdirs": [{"title": "Inner", "items": [{"id": "staff", "wms_name": "staff_map"}]}]}]
        }));

        let anonymous = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        assert!(anonymous.themes.subdirs.is_empty());
        assert!(anonymous.permitted_ids.is_empty());

        let alice = filter(&reader, &Identity::user("alice"), &ServiceConfig::default(), &catalog);
        assert_eq!(alice.permitted_ids, vec!["staff"]);
        let outer = &alice.themes.subdirs[0];
        assert!(outer.items.is_empty());
        assert_eq!(outer.subdirs[0].extra["title"], "Inner");
        assert_eq!(outer.subdirs[0].items[0].id.as_deref(), Some("staff"));
    }

    #[test]
    fn shared_plugin_data_merges_with_role_entries() {
        let reader = permissions(json!([
            {"role": "public", "permissions": {
                "wms_services": [{"name": "parks"}],
                "plugin_data": [{"name": "Redlining", "resources": ["symbols"]}]
            }},
            {"role": "user", "permissions": {
                "plugin_data": [{"name": "Redlining", "resources": ["arrows"]},
                                {"name": "Routing", "resources": ["bike"]}]
            }}
        ]));
        let catalog = catalog(json!({
            "items": [],
            "subdirs": [{"items": [{"id": "parks", "wms_name": "parks", "pluginData": {
                "Redlining": ["symbols", "arrows"],
                "Routing": ["bike"]
            }}]}],
            "pluginData": {
                "Redlining": [{"name": "symbols"}, {"name": "arrows"}],
                "Routing": [{"name": "bike"}]
            }
        }));

        let anonymous = filter(&reader, &Identity::anonymous(), &ServiceConfig::default(), &catalog);
        let themes = serde_json::to_value(&anonymous.themes).unwrap();
        assert_eq!(themes["pluginData"], json!({"Redlining": [{"name": "symbols"}]}));
        assert_eq!(themes["subdirs"][0]["items"][0]["pluginData"], json!({"Redlining": ["symbols"]}));

        let alice = filter(&reader, &Identity::user("alice"), &ServiceConfig::default(), &catalog);
        let themes = serde_json::to_value(&alice.themes).unwrap();
        assert_eq!(
            themes["pluginData"],
            json!({"Redlining": [{"name": "symbols"}, {"name": "arrows"}], "Routing": [{"name": "bike"}]})
        );
    }
}
