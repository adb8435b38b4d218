use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use url::{form_urlencoded, Url};

use super::{MapViewer, ViewerError};
use crate::database::user_info::DEFAULT_URL_PARAMS_FIELD;
use crate::identity::Identity;
use crate::resources::ResourceError;

/// URL parameters that select a theme or view
const VIEW_PARAMS: [&str; 3] = ["t", "k", "bk"];

/// Request for the viewer index page
#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    /// Full URL as requested by the client
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl IndexRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn has_view_params(&self) -> bool {
        VIEW_PARAMS
            .iter()
            .any(|key| self.param(key).is_some_and(|v| !v.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexResponse {
    Redirect(String),
    Page(PathBuf),
}

#[derive(Debug, Deserialize)]
struct ResolvedPermalink {
    #[serde(default)]
    query: PermalinkQuery,
}

#[derive(Debug, Default, Deserialize)]
struct PermalinkQuery {
    t: Option<String>,
}

impl MapViewer {
    /// Index page, or a redirect to default params or the login page
    pub async fn index(&self, identity: &Identity, request: &IndexRequest) -> Result<IndexResponse, ViewerError> {
        if let Some(url) = self.default_params_redirect(identity, request).await? {
            return Ok(IndexResponse::Redirect(url));
        }

        if self.resources.services.redirect_restricted_themes_to_auth && !identity.is_signed_in() {
            let theme = self.requested_theme(request).await;
            if let Some(theme) = theme.filter(|t| !t.is_empty()) {
                if self.theme_restricted(&theme)? {
                    if let Some(url) = self.login_redirect(&request.url) {
                        tracing::debug!("Restricted theme '{}' requested, redirecting to login", theme);
                        return Ok(IndexResponse::Redirect(url));
                    }
                }
            }
        }

        if self.resources.services.redirect_to_auth_if_no_permitted_themes {
            let permitted = self.permitted_themes(identity)?;
            if permitted.permitted_ids.is_empty() {
                if let Some(url) = self.login_redirect(&request.url) {
                    tracing::debug!("No permitted themes, redirecting to login");
                    return Ok(IndexResponse::Redirect(url));
                }
            }
        }

        let index = self.resources.index_file();
        if !index.is_file() {
            return Err(ResourceError::IndexNotFound(index).into());
        }
        Ok(IndexResponse::Page(index))
    }

    /// Redirect adding the user's `default_url_params` when no view is selected
    async fn default_params_redirect(
        &self,
        identity: &Identity,
        request: &IndexRequest,
    ) -> Result<Option<String>, ViewerError> {
        let (Some(store), Some(username)) = (&self.user_info, identity.username.as_deref()) else {
            return Ok(None);
        };
        if request.has_view_params() {
            return Ok(None);
        }

        let infos = store.user_infos(username).await?;
        let Some(defaults) = infos
            .get(DEFAULT_URL_PARAMS_FIELD)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };

        let present: HashSet<&str> = request.params.iter().map(|(k, _)| k.as_str()).collect();
        let added: Vec<(String, String)> = form_urlencoded::parse(defaults.as_bytes())
            .filter(|(key, _)| !present.contains(key.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if added.is_empty() {
            return Ok(None);
        }

        let Ok(mut url) = Url::parse(&request.url) else {
            tracing::warn!("Cannot apply default URL params to '{}'", request.url);
            return Ok(None);
        };
        url.query_pairs_mut().clear().extend_pairs(added.iter().chain(&request.params));
        Ok(Some(url.to_string()))
    }

    /// Theme from `t`, or from a permalink given by `k`
    async fn requested_theme(&self, request: &IndexRequest) -> Option<String> {
        let theme = request.param("t").map(str::to_string);
        let Some(key) = request.param("k") else {
            return theme;
        };
        let services = &self.resources.services;
        if services.permalink_service_url.is_empty()
            || services.internal_permalink_service_url.is_empty()
            || services.auth_service_url.is_empty()
        {
            return theme;
        }

        match self.resolve_permalink(key).await {
            Ok(Some(resolved)) => {
                tracing::debug!("Permalink contains theme '{}'", resolved);
                Some(resolved)
            }
            Ok(None) => theme,
            Err(err) => {
                tracing::warn!("Could not resolve permalink: {}", err);
                theme
            }
        }
    }

    async fn resolve_permalink(&self, key: &str) -> Result<Option<String>, reqwest::Error> {
        let url = format!(
            "{}resolvepermalink",
            self.resources.services.internal_permalink_service_url
        );
        let mut request = self.http.get(&url).query(&[("key", key)]);
        if let Some(header) = &self.tenant_header {
            request = request.header(header.as_str(), self.tenant.as_str());
        }
        let permalink: ResolvedPermalink = request.send().await?.error_for_status()?.json().await?;
        Ok(permalink.query.t)
    }

    /// Known theme that is not permitted for anonymous users
    fn theme_restricted(&self, theme: &str) -> Result<bool, ViewerError> {
        if !self
            .resources
            .themes
            .all_items()
            .any(|item| item.id.as_deref() == Some(theme))
        {
            return Ok(false);
        }
        let public = self.permitted_themes(&Identity::anonymous())?;
        Ok(!public.permitted_ids.iter().any(|id| id == theme))
    }

    fn login_redirect(&self, request_url: &str) -> Option<String> {
        let auth = &self.resources.services.auth_service_url;
        if auth.is_empty() {
            return None;
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("url", request_url)
            .finish();
        Some(format!("{}login?{}", auth, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::permissions::PermissionsReader;
    use crate::resources::TenantResources;
    use crate::themes::ThemeGroup;
    use crate::viewer::ViewerAppConfig;
    use serde_json::json;

    fn viewer(services: ServiceConfig, config_dir: PathBuf) -> MapViewer {
        let themes: ThemeGroup = serde_json::from_value(json!({
            "items": [
                {"id": "parks", "wms_name": "parks"},
                {"id": "secret", "wms_name": "secret"}
            ],
            "subdirs": []
        }))
        .unwrap();
        let permissions = PermissionsReader::from_value(
            json!({"roles": [
                {"role": "public", "permissions": {"wms_services": [{"name": "parks"}]}},
                {"role": "staff", "permissions": {"wms_services": [{"name": "secret"}]}}
            ],
            "users": [{"name": "alice", "roles": ["staff"]}]}),
            "public",
        )
        .unwrap();
        let mut resources = TenantResources::new(services, ViewerAppConfig::default(), themes);
        resources.config_dir = config_dir;
        MapViewer::new("demo", resources, Box::new(permissions))
    }

    fn request(url: &str, params: &[(&str, &str)]) -> IndexRequest {
        IndexRequest {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn redirecting_services() -> ServiceConfig {
        ServiceConfig {
            auth_service_url: "/auth/".to_string(),
            redirect_restricted_themes_to_auth: true,
            ..ServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn serves_index_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let viewer = viewer(ServiceConfig::default(), dir.path().to_path_buf());

        let response = viewer
            .index(&Identity::anonymous(), &request("http://localhost/", &[]))
            .await
            .unwrap();
        assert_eq!(response, IndexResponse::Page(dir.path().join("index.html")));
    }

    #[tokio::test]
    async fn missing_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let viewer = viewer(ServiceConfig::default(), dir.path().to_path_buf());
        let result = viewer
            .index(&Identity::anonymous(), &request("http://localhost/", &[]))
            .await;
        assert!(matches!(
            result,
            Err(ViewerError::Resource(ResourceError::IndexNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn restricted_theme_redirects_to_login() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "").unwrap();
        let viewer = viewer(redirecting_services(), dir.path().to_path_buf());

        let response = viewer
            .index(
                &Identity::anonymous(),
                &request("http://localhost/?t=secret", &[("t", "secret")]),
            )
            .await
            .unwrap();
        assert_eq!(
            response,
            IndexResponse::Redirect("/auth/login?url=http%3A%2F%2Flocalhost%2F%3Ft%3Dsecret".to_string())
        );

        // Public and unknown themes are served
        for theme in ["parks", "unknown"] {
            let response = viewer
                .index(&Identity::anonymous(), &request("http://localhost/", &[("t", theme)]))
                .await
                .unwrap();
            assert!(matches!(response, IndexResponse::Page(_)));
        }

        // Signed in users are never redirected
        let response = viewer
            .index(&Identity::user("alice"), &request("http://localhost/", &[("t", "secret")]))
            .await
            .unwrap();
        assert!(matches!(response, IndexResponse::Page(_)));
    }

    #[tokio::test]
    async fn no_permitted_themes_redirects_to_login() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "").unwrap();
        let services = ServiceConfig {
            auth_service_url: "/auth/".to_string(),
            redirect_to_auth_if_no_permitted_themes: true,
            ..ServiceConfig::default()
        };
        let mut viewer = viewer(services, dir.path().to_path_buf());
        viewer.resources.themes.items.retain(|item| item.id.as_deref() == Some("secret"));

        let response = viewer
            .index(&Identity::anonymous(), &request("http://localhost/", &[]))
            .await
            .unwrap();
        assert!(matches!(response, IndexResponse::Redirect(url) if url.starts_with("/auth/login?url=")));

        let response = viewer
            .index(&Identity::user("bob"), &request("http://localhost/", &[]))
            .await
            .unwrap();
        assert!(matches!(response, IndexResponse::Redirect(url) if url.starts_with("/auth/login?url=")));

        let response = viewer
            .index(&Identity::user("alice"), &request("http://localhost/", &[]))
            .await
            .unwrap();
        assert!(matches!(response, IndexResponse::Page(_)));
    }

    #[test]
    fn view_params_detected() {
        assert!(request("http://x/", &[("t", "parks")]).has_view_params());
        assert!(request("http://x/", &[("bk", "abc")]).has_view_params());
        assert!(!request("http://x/", &[("t", ""), ("lang", "de")]).has_view_params());
    }
}
