pub mod error;
pub mod reader;
pub mod resolver;

use serde_json::Value;

use crate::identity::Identity;

pub use error::PermissionError;
pub use reader::PermissionsReader;
pub use resolver::{
    DatasetPermission, MergedPermission, NameSet, PermissionResolver, PluginDataPermission,
    WmsPermission,
};

/// Source of permission records for an identity.
///
/// `resource_name` narrows the result to records granting that single
/// resource. An empty result means "not permitted"; an `Err` means the lookup
/// itself failed and must never be read as a grant.
pub trait PermissionClient: Send + Sync {
    fn resource_permissions(
        &self,
        resource_type: &str,
        identity: &Identity,
        resource_name: Option<&str>,
    ) -> Result<Vec<Value>, PermissionError>;
}
