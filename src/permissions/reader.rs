use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::{PermissionClient, PermissionError};
use crate::identity::Identity;

#[derive(Debug, Default, Deserialize)]
struct PermissionsDocument {
    #[serde(default)]
    users: Vec<Principal>,
    #[serde(default)]
    groups: Vec<Principal>,
    #[serde(default)]
    roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct Principal {
    name: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Role {
    role: String,
    #[serde(default)]
    permissions: HashMap<String, Vec<Value>>,
}

/// Permission client backed by a tenant's `permissions.json`.
///
/// The effective roles of an identity are the public role, the user's own
/// roles, the roles of the user's groups and the roles of the identity group.
#[derive(Debug)]
pub struct PermissionsReader {
    users: HashMap<String, Principal>,
    groups: HashMap<String, Principal>,
    roles: HashMap<String, HashMap<String, Vec<Value>>>,
    public_role: String,
}

impl PermissionsReader {
    pub fn load(path: &Path, public_role: &str) -> Result<Self, PermissionError> {
        let content = std::fs::read_to_string(path).map_err(|source| PermissionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = serde_json::from_str(&content).map_err(|source| PermissionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let reader = Self::from_document(document, public_role);
        tracing::info!(
            "Loaded permissions from {} ({} users, {} groups, {} roles)",
            path.display(),
            reader.users.len(),
            reader.groups.len(),
            reader.roles.len()
        );
        Ok(reader)
    }

    pub fn from_value(value: Value, public_role: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_document(serde_json::from_value(value)?, public_role))
    }

    fn from_document(document: PermissionsDocument, public_role: &str) -> Self {
        Self {
            users: document.users.into_iter().map(|u| (u.name.clone(), u)).collect(),
            groups: document.groups.into_iter().map(|g| (g.name.clone(), g)).collect(),
            roles: document.roles.into_iter().map(|r| (r.role, r.permissions)).collect(),
            public_role: public_role.to_string(),
        }
    }

    /// Role names held by the identity, without duplicates
    pub fn effective_roles(&self, identity: &Identity) -> Vec<&str> {
        let mut granted: Vec<&String> = Vec::new();

        if let Some(user) = identity.username.as_deref().and_then(|name| self.users.get(name)) {
            granted.extend(&user.roles);
            for group in user.groups.iter().filter_map(|name| self.groups.get(name)) {
                granted.extend(&group.roles);
            }
        }

        if let Some(group) = identity.group.as_deref().and_then(|name| self.groups.get(name)) {
            granted.extend(&group.roles);
        }

        let mut roles: Vec<&str> = vec![self.public_role.as_str()];
        for role in granted {
            if !roles.contains(&role.as_str()) {
                roles.push(role.as_str());
            }
        }
        roles
    }
}

fn grants(entry: &Value, name: &str) -> bool {
    match entry {
        Value::String(value) => value == name,
        Value::Object(fields) => fields.get("name").and_then(Value::as_str) == Some(name),
        _ => false,
    }
}

impl PermissionClient for PermissionsReader {
    fn resource_permissions(
        &self,
        resource_type: &str,
        identity: &Identity,
        resource_name: Option<&str>,
    ) -> Result<Vec<Value>, PermissionError> {
        let records: Vec<Value> = self
            .effective_roles(identity)
            .into_iter()
            .filter_map(|role| self.roles.get(role))
            .filter_map(|permissions| permissions.get(resource_type))
            .flatten()
            .filter(|entry| resource_name.map_or(true, |name| grants(entry, name)))
            .cloned()
            .collect();

        tracing::debug!(
            "{} {} record(s) for {:?}{}",
            records.len(),
            resource_type,
            identity.username,
            resource_name.map(|n| format!(" ({})", n)).unwrap_or_default()
        );
        Ok(records)
    }
}
