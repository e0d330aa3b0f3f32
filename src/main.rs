//! Rentaldesk - DVD rental assistant backend
//!
#![doc = "Rentaldesk - DVD rental assistant backend"]
#![doc = "Main entry point for the rentaldesk binary."]

use anyhow::Result;

use rentaldesk::cli::{Cli, Commands};
use rentaldesk::commands;
use rentaldesk::config::Config;
use rentaldesk::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Rentaldesk v{}", env!("CARGO_PKG_VERSION"));
            commands::serve::run_server(config).await
        }
        Commands::Tools { manifest, json } => {
            commands::tools::list_tools(&config, manifest, json).await
        }
    }
}
