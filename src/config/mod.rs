pub mod service;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub use service::ServiceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub tenants: TenantConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Root directory holding one sub directory per tenant
    pub config_path: PathBuf,
    /// Request header carrying the tenant name (None = single tenant)
    pub tenant_header: Option<String>,
    pub default_tenant: String,
    /// Role every identity holds, including anonymous users
    pub public_role: String,
    /// Raw `ORIGIN_CONFIG` JSON for request-origin group detection
    pub origin_config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_cookie_name: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("MAP_VIEWER_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("SERVER_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }

        // Tenant overrides
        if let Ok(v) = env::var("CONFIG_PATH") {
            self.tenants.config_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TENANT_HEADER") {
            self.tenants.tenant_header = Some(v).filter(|h| !h.trim().is_empty());
        }
        if let Ok(v) = env::var("DEFAULT_TENANT") {
            self.tenants.default_tenant = v;
        }
        if let Ok(v) = env::var("PUBLIC_ROLE") {
            self.tenants.public_role = v;
        }
        if let Ok(v) = env::var("ORIGIN_CONFIG") {
            self.tenants.origin_config = Some(v);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET_KEY") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_COOKIE_NAME") {
            self.security.jwt_cookie_name = v;
        }

        self
    }

    fn base() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 5030,
                enable_request_logging: true,
                enable_cors: true,
            },
            tenants: TenantConfig {
                config_path: PathBuf::from("config"),
                tenant_header: None,
                default_tenant: "default".to_string(),
                public_role: "public".to_string(),
                origin_config: None,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_cookie_name: "access_token_cookie".to_string(),
            },
        }
    }

    pub fn development() -> Self {
        Self::base()
    }

    fn staging() -> Self {
        let mut config = Self::base();
        config.environment = Environment::Staging;
        config
    }

    fn production() -> Self {
        let mut config = Self::base();
        config.environment = Environment::Production;
        config.server.enable_request_logging = false;
        config.server.enable_cors = false;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 5030);
        assert_eq!(config.tenants.default_tenant, "default");
        assert_eq!(config.tenants.public_role, "public");
        assert!(config.tenants.tenant_header.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(matches!(config.environment, Environment::Production));
        assert!(!config.server.enable_request_logging);
        assert_eq!(config.security.jwt_cookie_name, "access_token_cookie");
    }
}
