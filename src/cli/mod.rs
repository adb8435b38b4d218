pub mod commands;

use clap::{Parser, Subcommand};

use crate::config;

#[derive(Parser)]
#[command(name = "map-viewer")]
#[command(about = "Map viewer service - per-user viewer config and theme catalogs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP service")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides MAP_VIEWER_PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Print themes.json as seen by an identity")]
    Themes {
        #[command(flatten)]
        identity: commands::IdentityArgs,

        #[arg(long, help = "Locale for theme translations")]
        lang: Option<String>,
    },

    #[command(about = "Print config.json as seen by an identity")]
    Config {
        #[command(flatten)]
        identity: commands::IdentityArgs,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config().clone();

    match cli.command {
        Commands::Serve { port } => commands::serve::handle(config, port).await,
        Commands::Themes { identity, lang } => {
            commands::themes::handle(&config, &identity, lang.as_deref()).await
        }
        Commands::Config { identity } => commands::config::handle(&config, &identity).await,
    }
}
