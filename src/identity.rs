use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Group assigned when no origin rule matches
pub const PUBLIC_ORIGIN_GROUP: &str = "_public_";

/// Rules used when `ORIGIN_CONFIG` is not set: local requests are internal
const DEFAULT_ORIGIN_CONFIG: &str = r#"{"host": {"_intern_": "^127.0.0.1(:\\d+)?$"}}"#;

/// Requesting user as seen by the viewer service. Built once per request and
/// read-only afterwards. A missing username is an anonymous user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub username: Option<String>,
    pub group: Option<String>,
    #[serde(default)]
    pub autologin: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub user_infos: Map<String, Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn is_signed_in(&self) -> bool {
        self.username.is_some()
    }

    /// Build from a JWT `sub` claim, which is either a plain username or an
    /// object carrying `username`, `group`, `autologin` and `user_infos`.
    pub fn from_claim(sub: &Value) -> Self {
        match sub {
            Value::String(username) => Self::user(username.clone()),
            Value::Object(fields) => Self {
                username: fields.get("username").and_then(Value::as_str).map(str::to_string),
                group: fields.get("group").and_then(Value::as_str).map(str::to_string),
                autologin: fields.get("autologin").map_or(false, |v| !v.is_null()),
                user_infos: fields
                    .get("user_infos")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            },
            _ => Self::anonymous(),
        }
    }
}

/// Assigns the identity group from the request origin
#[derive(Debug, Clone)]
pub struct OriginDetector {
    host_rules: Vec<(String, Regex)>,
}

impl OriginDetector {
    /// Parse `{"host": {<group>: <regex>}}`; `None` uses the local-host default.
    /// Rules are tried in group name order.
    pub fn from_config(config: Option<&str>) -> Result<Self, OriginConfigError> {
        let raw: Value = serde_json::from_str(config.unwrap_or(DEFAULT_ORIGIN_CONFIG))?;

        let mut host_rules = Vec::new();
        if let Some(rules) = raw.get("host").and_then(Value::as_object) {
            for (group, expr) in rules {
                let expr = expr
                    .as_str()
                    .ok_or_else(|| OriginConfigError::Rule(group.clone()))?;
                // Rules match from the start of the host like a prefix match
                let regex = Regex::new(&format!("^(?:{})", expr))?;
                host_rules.push((group.clone(), regex));
            }
        }

        Ok(Self { host_rules })
    }

    pub fn detect(&self, mut identity: Identity, host: &str) -> Identity {
        let group = self
            .host_rules
            .iter()
            .find(|(_, regex)| regex.is_match(host))
            .map(|(group, _)| group.as_str())
            .unwrap_or(PUBLIC_ORIGIN_GROUP);

        tracing::debug!("Origin '{}' assigned group '{}'", host, group);
        identity.group = Some(group.to_string());
        identity
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OriginConfigError {
    #[error("ORIGIN_CONFIG is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ORIGIN_CONFIG rule for group '{0}' must be a string")]
    Rule(String),

    #[error("ORIGIN_CONFIG contains an invalid regex: {0}")]
    Regex(#[from] regex::Error),
}
