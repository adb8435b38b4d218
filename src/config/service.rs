use serde::Serialize;
use serde_json::Value;

const DEFAULT_OGC_SERVICE_URL: &str = "http://localhost:5013/";
const DEFAULT_INTERNAL_PERMALINK_SERVICE_URL: &str = "http://qwc-permalink-service:9090";
const DEFAULT_CONFIG_SCHEMA: &str = "qwc_config";

/// Per-tenant viewer service settings, read from the `config` section of the
/// tenant's `mapViewerConfig.json`. Every key can be overridden by the
/// upper-cased environment variable of the same name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceConfig {
    // Service URLs injected into config.json
    pub auth_service_url: String,
    pub ccc_config_service_url: String,
    pub data_service_url: String,
    pub dataproduct_service_url: String,
    pub document_service_url: String,
    pub elevation_service_url: String,
    pub landreg_service_url: String,
    pub mapinfo_service_url: String,
    pub permalink_service_url: String,
    pub plotinfo_service_url: String,
    pub proxy_service_url: String,
    pub search_service_url: String,
    pub search_data_service_url: String,

    // Service URLs injected into themes.json
    pub ogc_service_url: String,
    pub info_service_url: String,
    pub legend_service_url: String,
    pub print_service_url: String,

    /// Permalink service URL reachable from this service (not from browsers)
    pub internal_permalink_service_url: String,

    pub show_restricted_themes: bool,
    /// Theme names eligible for restricted placeholders (empty = all)
    pub show_restricted_themes_whitelist: Vec<String>,
    pub redirect_restricted_themes_to_auth: bool,
    pub redirect_to_auth_if_no_permitted_themes: bool,

    pub db_url: Option<String>,
    pub qwc_config_schema: String,
    pub user_info_fields: Vec<String>,
    pub display_user_info_field: Option<String>,

    /// `WMS_DPI` override for config.json
    pub wms_dpi: Option<String>,
}

/// Lookup of a single config key, env var first
struct ConfigSource<'a, F: Fn(&str) -> Option<String>> {
    config: &'a Value,
    env: F,
}

impl<'a, F: Fn(&str) -> Option<String>> ConfigSource<'a, F> {
    fn raw(&self, key: &str) -> Option<Value> {
        if let Some(value) = (self.env)(&key.to_uppercase()) {
            return Some(Value::String(value));
        }
        self.config.get(key).filter(|v| !v.is_null()).cloned()
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.raw(key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn bool(&self, key: &str) -> bool {
        match self.raw(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        }
    }

    /// Accepts a JSON array, a JSON array encoded as string, or a comma separated string
    fn list(&self, key: &str) -> Vec<String> {
        match self.raw(key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => {
                if let Ok(Value::Array(values)) = serde_json::from_str::<Value>(&s) {
                    return values
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                }
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn url(&self, key: &str) -> String {
        sanitize_url(self.string(key).as_deref())
    }
}

impl ServiceConfig {
    /// Build from a tenant config section, with process env overrides
    pub fn from_value(config: &Value) -> Self {
        Self::from_value_with_env(config, |key| std::env::var(key).ok())
    }

    pub fn from_value_with_env<F>(config: &Value, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = ConfigSource { config, env };

        let document_service_url = match source.string("document_service_url") {
            Some(url) => sanitize_url(Some(&url)),
            None => source.url("feature_report_service_url"),
        };

        let ogc_service_url = sanitize_url(Some(
            &source
                .string("ogc_service_url")
                .unwrap_or_else(|| DEFAULT_OGC_SERVICE_URL.to_string()),
        ));
        let with_ogc_default = |key: &str| match source.string(key) {
            Some(url) => sanitize_url(Some(&url)),
            None => ogc_service_url.clone(),
        };
        let info_service_url = with_ogc_default("info_service_url");
        let legend_service_url = with_ogc_default("legend_service_url");
        let print_service_url = with_ogc_default("print_service_url");

        let permalink_service_url = source.url("permalink_service_url");
        let internal_permalink_service_url = match source.string("internal_permalink_service_url") {
            Some(url) => sanitize_url(Some(&url)),
            None if !permalink_service_url.is_empty() => {
                sanitize_url(Some(DEFAULT_INTERNAL_PERMALINK_SERVICE_URL))
            }
            None => String::new(),
        };

        Self {
            auth_service_url: source.url("auth_service_url"),
            ccc_config_service_url: source.url("ccc_config_service_url"),
            data_service_url: source.url("data_service_url"),
            dataproduct_service_url: source.url("dataproduct_service_url"),
            document_service_url,
            elevation_service_url: source.url("elevation_service_url"),
            landreg_service_url: source.url("landreg_service_url"),
            mapinfo_service_url: source.url("mapinfo_service_url"),
            permalink_service_url,
            plotinfo_service_url: source.url("plotinfo_service_url"),
            proxy_service_url: source.url("proxy_service_url"),
            search_service_url: source.url("search_service_url"),
            search_data_service_url: source.url("search_data_service_url"),
            ogc_service_url,
            info_service_url,
            legend_service_url,
            print_service_url,
            internal_permalink_service_url,
            show_restricted_themes: source.bool("show_restricted_themes"),
            show_restricted_themes_whitelist: source.list("show_restricted_themes_whitelist"),
            redirect_restricted_themes_to_auth: source.bool("redirect_restricted_themes_to_auth"),
            redirect_to_auth_if_no_permitted_themes: source
                .bool("redirect_to_auth_if_no_permitted_themes"),
            db_url: source.string("db_url").filter(|url| !url.is_empty()),
            qwc_config_schema: source
                .string("qwc_config_schema")
                .unwrap_or_else(|| DEFAULT_CONFIG_SCHEMA.to_string()),
            user_info_fields: source.list("user_info_fields"),
            display_user_info_field: source
                .string("display_user_info_field")
                .filter(|field| !field.is_empty()),
            wms_dpi: source.string("wms_dpi").filter(|dpi| !dpi.is_empty()),
        }
    }

    /// Service URL overrides for config.json as (config key, url) pairs
    pub fn viewer_service_urls(&self) -> [(&'static str, &str); 13] {
        [
            ("authServiceUrl", self.auth_service_url.as_str()),
            ("cccConfigService", self.ccc_config_service_url.as_str()),
            ("editServiceUrl", self.data_service_url.as_str()),
            ("dataproductServiceUrl", self.dataproduct_service_url.as_str()),
            ("documentServiceUrl", self.document_service_url.as_str()),
            ("elevationServiceUrl", self.elevation_service_url.as_str()),
            ("landRegisterService", self.landreg_service_url.as_str()),
            ("mapInfoService", self.mapinfo_service_url.as_str()),
            ("permalinkServiceUrl", self.permalink_service_url.as_str()),
            ("plotInfoService", self.plotinfo_service_url.as_str()),
            ("proxyServiceUrl", self.proxy_service_url.as_str()),
            ("searchServiceUrl", self.search_service_url.as_str()),
            ("searchDataServiceUrl", self.search_data_service_url.as_str()),
        ]
    }
}

/// Normalize a service URL to end with exactly one slash; unset stays empty
pub fn sanitize_url(url: Option<&str>) -> String {
    match url {
        Some(url) if !url.is_empty() => format!("{}/", url.trim_end_matches('/')),
        _ => String::new(),
    }
}
