use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};

use super::{PermissionClient, PermissionError};
use crate::identity::Identity;

/// Token granting every name of a resource type
pub const WILDCARD: &str = "*";

/// A permission entry referring to a resource by name, either as a bare
/// string or as an object with a `name` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NameRef {
    Name(String),
    Named { name: String },
}

impl NameRef {
    fn into_name(self) -> String {
        match self {
            NameRef::Name(name) | NameRef::Named { name } => name,
        }
    }
}

fn name_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let refs = Vec::<NameRef>::deserialize(deserializer)?;
    Ok(refs.into_iter().map(NameRef::into_name).collect())
}

/// Permitted names of a scalar resource type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameSet {
    names: BTreeSet<String>,
    wildcard: bool,
}

impl NameSet {
    pub fn all() -> Self {
        Self {
            names: BTreeSet::new(),
            wildcard: true,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.wildcard || self.names.contains(name)
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn is_empty(&self) -> bool {
        !self.wildcard && self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = NameSet::default();
        for name in iter {
            let name = name.into();
            if name == WILDCARD {
                set.wildcard = true;
            } else {
                set.names.insert(name);
            }
        }
        set
    }
}

/// A typed permission record whose records for one resource are combined
/// into a single effective permission.
pub trait MergedPermission: DeserializeOwned + Sized {
    const RESOURCE_TYPE: &'static str;

    /// Combine two records granted through different roles
    fn merge(self, other: Self) -> Self;

    /// Normalize the merged result
    fn finish(self) -> Self {
        self
    }
}

/// `wms_services` record: permitted layers and print templates
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WmsPermission {
    #[serde(default, deserialize_with = "name_set")]
    pub layers: BTreeSet<String>,
    #[serde(default)]
    pub print_templates: BTreeSet<String>,
}

impl MergedPermission for WmsPermission {
    const RESOURCE_TYPE: &'static str = "wms_services";

    fn merge(mut self, other: Self) -> Self {
        self.layers.extend(other.layers);
        self.print_templates.extend(other.print_templates);
        self
    }
}

/// `data_datasets` record: permitted attributes and CRUD flags
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatasetPermission {
    #[serde(default)]
    pub attributes: BTreeSet<String>,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub creatable: bool,
    #[serde(default)]
    pub updatable: bool,
    #[serde(default)]
    pub deletable: bool,
}

impl MergedPermission for DatasetPermission {
    const RESOURCE_TYPE: &'static str = "data_datasets";

    fn merge(mut self, other: Self) -> Self {
        self.attributes.extend(other.attributes);
        self.writable |= other.writable;
        self.creatable |= other.creatable;
        self.updatable |= other.updatable;
        self.deletable |= other.deletable;
        self
    }

    /// `writable` and full CRUD imply each other
    fn finish(mut self) -> Self {
        self.writable |= self.creatable && self.updatable && self.deletable;
        self.creatable |= self.writable;
        self.updatable |= self.writable;
        self.deletable |= self.writable;
        self
    }
}

#[derive(Debug, Deserialize)]
struct PluginDataRecord {
    name: String,
    #[serde(default)]
    resources: Vec<String>,
}

/// `plugin_data` records combined per plugin
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "PluginDataRecord")]
pub struct PluginDataPermission {
    pub plugins: BTreeMap<String, NameSet>,
}

impl From<PluginDataRecord> for PluginDataPermission {
    fn from(record: PluginDataRecord) -> Self {
        let mut plugins = BTreeMap::new();
        plugins.insert(record.name, record.resources.into_iter().collect());
        Self { plugins }
    }
}

impl PluginDataPermission {
    pub fn resources(&self, plugin: &str) -> Option<&NameSet> {
        self.plugins.get(plugin)
    }
}

impl MergedPermission for PluginDataPermission {
    const RESOURCE_TYPE: &'static str = "plugin_data";

    fn merge(mut self, other: Self) -> Self {
        for (plugin, resources) in other.plugins {
            let entry = self.plugins.entry(plugin).or_default();
            entry.wildcard |= resources.wildcard;
            entry.names.extend(resources.names);
        }
        self
    }
}

/// Resolves effective permissions of one identity
pub struct PermissionResolver<'a> {
    client: &'a dyn PermissionClient,
    identity: &'a Identity,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(client: &'a dyn PermissionClient, identity: &'a Identity) -> Self {
        Self { client, identity }
    }

    pub fn identity(&self) -> &Identity {
        self.identity
    }

    /// Typed records of a resource type; malformed records are skipped
    pub fn records<T: DeserializeOwned>(
        &self,
        resource_type: &str,
        resource_name: Option<&str>,
    ) -> Result<Vec<T>, PermissionError> {
        let raw = self
            .client
            .resource_permissions(resource_type, self.identity, resource_name)?;

        Ok(raw
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(typed) => Some(typed),
                Err(e) => {
                    tracing::warn!("Skipping malformed {} permission: {}", resource_type, e);
                    None
                }
            })
            .collect())
    }

    /// Permitted names of a resource type, honoring the wildcard token
    pub fn names(&self, resource_type: &str) -> Result<NameSet, PermissionError> {
        Ok(self
            .records::<NameRef>(resource_type, None)?
            .into_iter()
            .map(NameRef::into_name)
            .collect())
    }

    /// Union of all records for one resource; `None` when nothing is granted
    pub fn merged<P: MergedPermission>(
        &self,
        resource_name: Option<&str>,
    ) -> Result<Option<P>, PermissionError> {
        Ok(self
            .records::<P>(P::RESOURCE_TYPE, resource_name)?
            .into_iter()
            .reduce(P::merge)
            .map(P::finish))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionsReader;
    use serde_json::json;

    fn reader(permissions: serde_json::Value) -> PermissionsReader {
        PermissionsReader::from_value(
            json!({
                "users": [{"name": "alice", "roles": ["a", "b"]}],
                "roles": [{"role": "a", "permissions": permissions}, {"role": "b", "permissions": {
                    "data_datasets": [{"name": "parks.trees", "attributes": ["b"],
                        "creatable": true, "updatable": true, "deletable": true}],
                    "wms_services": [{"name": "parks", "layers": [{"name": "benches"}], "print_templates": ["A4"]}]
                }}]
            }),
            "public",
        )
        .unwrap()
    }

    #[test]
    fn wildcard_grants_unknown_names() {
        let set: NameSet = vec!["*"].into_iter().collect();
        assert!(set.contains("anything"));
        assert!(!set.is_empty());
        assert!(NameSet::default().is_empty());
    }

    #[test]
    fn wms_records_are_unioned() {
        let reader = reader(json!({
            "wms_services": [{"name": "parks", "layers": [{"name": "trees"}]}]
        }));
        let alice = Identity::user("alice");
        let resolver = PermissionResolver::new(&reader, &alice);
        let wms = resolver.merged::<WmsPermission>(Some("parks")).unwrap().unwrap();
        assert_eq!(wms.layers, BTreeSet::from(["trees".to_string(), "benches".to_string()]));
        assert_eq!(wms.print_templates, BTreeSet::from(["A4".to_string()]));
    }

    #[test]
    fn dataset_crud_flags_imply_writable() {
        let reader = reader(json!({
            "data_datasets": [{"name": "parks.trees", "attributes": ["a"], "writable": false}]
        }));
        let alice = Identity::user("alice");
        let resolver = PermissionResolver::new(&reader, &alice);
        let dataset = resolver
            .merged::<DatasetPermission>(Some("parks.trees"))
            .unwrap()
            .unwrap();
        assert_eq!(dataset.attributes, BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert!(dataset.writable);
        assert!(dataset.creatable && dataset.updatable && dataset.deletable);
    }

    #[test]
    fn writable_implies_crud_flags() {
        let merged = DatasetPermission {
            writable: true,
            ..Default::default()
        }
        .finish();
        assert!(merged.creatable && merged.updatable && merged.deletable);
    }

    #[test]
    fn nothing_granted_is_none() {
        let reader = reader(json!({}));
        let bob = Identity::user("bob");
        let resolver = PermissionResolver::new(&reader, &bob);
        assert!(resolver.merged::<WmsPermission>(Some("parks")).unwrap().is_none());
        assert!(resolver.names("background_layers").unwrap().is_empty());
    }

    #[test]
    fn plugin_data_merged_per_plugin() {
        let reader = reader(json!({
            "plugin_data": [
                {"name": "Redlining", "resources": ["symbols"]},
                {"name": "Routing", "resources": ["*"]}
            ]
        }));
        let alice = Identity::user("alice");
        let resolver = PermissionResolver::new(&reader, &alice);
        let plugins = resolver.merged::<PluginDataPermission>(None).unwrap().unwrap();
        assert!(plugins.resources("Redlining").unwrap().contains("symbols"));
        assert!(!plugins.resources("Redlining").unwrap().contains("arrows"));
        assert!(plugins.resources("Routing").unwrap().contains("bike"));
        assert!(plugins.resources("Other").is_none());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let reader = reader(json!({"wms_services": [{"name": "parks", "layers": "oops"}]}));
        let alice = Identity::user("alice");
        let resolver = PermissionResolver::new(&reader, &alice);
        let wms = resolver.merged::<WmsPermission>(Some("parks")).unwrap().unwrap();
        assert_eq!(wms.layers, BTreeSet::from(["benches".to_string()]));
    }
}
