// EDBP Plugin Manager
// Main entry point for the edbp binary

use clap::Parser;
use edbp_engine::cli::{Cli, Command};
use edbp_engine::config::Config;
use edbp_engine::handlers::{
    check_log_level, handle_install, handle_install_url, handle_list, handle_load_all,
    handle_pending, handle_set_enabled, handle_shop, handle_uninstall, OutputFormat,
};
use edbp_engine::telemetry::init_telemetry_with_level;

// Plugin runtimes are single-threaded
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the configured level (RUST_LOG wins over both)
    let log_level = match cli.log.as_deref() {
        Some(level) => {
            check_log_level(level)?;
            level
        }
        None => config.core.log_level.as_str(),
    };
    init_telemetry_with_level(log_level);

    tracing::info!("EDBP Plugin Manager v{}", env!("CARGO_PKG_VERSION"));

    // Handle commands
    match cli.command {
        Command::List => handle_list(&config, format).await,

        Command::Install { path } => {
            tracing::info!("Installing plugin from {}", path.display());
            handle_install(&path, &config, format).await
        }

        Command::InstallUrl { url, id, defer } => {
            tracing::info!("Installing plugin from {}", url);
            handle_install_url(&url, id.as_deref(), defer, &config, format).await
        }

        Command::Uninstall { id } => handle_uninstall(&id, &config, format).await,

        Command::Enable { id } => handle_set_enabled(&id, true, &config, format).await,

        Command::Disable { id } => handle_set_enabled(&id, false, &config, format).await,

        Command::LoadAll => handle_load_all(&config, format).await,

        Command::Shop { query } => handle_shop(query.as_deref(), &config, format).await,

        Command::Pending => handle_pending(&config, format).await,
    }
}
