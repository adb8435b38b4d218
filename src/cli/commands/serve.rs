use crate::app;
use crate::config::AppConfig;

pub async fn handle(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!(
        "Starting map viewer service in {:?} mode (config path {})",
        config.environment,
        config.tenants.config_path.display()
    );
    app::serve(config).await
}
