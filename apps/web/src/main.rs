use core_config::tracing::{init_tracing, install_color_eyre};
use tracing::info;

mod bootstrap;
mod config;
mod routes;
mod state;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    info!(
        name = config.app.name,
        version = config.app.version,
        "Bootstrapping web server"
    );

    // Any StartupError ends up here and turns into a non-zero exit
    bootstrap::run(config).await?;

    info!("Web server shutdown complete");
    Ok(())
}
