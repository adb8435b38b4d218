use super::{print_json, IdentityArgs};
use crate::config::AppConfig;

pub async fn handle(config: &AppConfig, args: &IdentityArgs, lang: Option<&str>) -> anyhow::Result<()> {
    let viewer = args.load_viewer(config)?;
    let document = viewer.themes(&args.identity(), lang)?;
    print_json(&document)
}
