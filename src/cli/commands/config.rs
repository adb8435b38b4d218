use super::{print_json, IdentityArgs};
use crate::config::AppConfig;

pub async fn handle(config: &AppConfig, args: &IdentityArgs) -> anyhow::Result<()> {
    let viewer = args.load_viewer(config)?;
    let identity = args.identity();
    let viewer_config = viewer.config(&identity, identity.autologin).await?;
    print_json(&viewer_config)
}
