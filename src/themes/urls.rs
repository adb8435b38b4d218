use super::model::ThemeGroup;
use crate::config::ServiceConfig;

/// Point surviving items at the configured OGC, info, legend and print services
pub fn apply_service_urls(themes: &mut ThemeGroup, services: &ServiceConfig) {
    for item in themes.all_items_mut() {
        let Some(wms_name) = item.wms_name.clone().filter(|name| !name.is_empty()) else {
            continue;
        };

        item.url = Some(format!("{}{}", services.ogc_service_url, wms_name));
        item.feature_info_url = Some(format!("{}{}", services.info_service_url, wms_name));
        item.legend_url = Some(format!(
            "{}{}?{}",
            services.legend_service_url,
            wms_name,
            item.extra_legend_parameters.as_deref().unwrap_or_default()
        ));
        if item.print.as_ref().map_or(false, |templates| !templates.is_empty()) {
            item.print_url = Some(format!("{}{}", services.print_service_url, wms_name));
        }
    }
}
