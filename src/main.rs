use clap::Parser;
use tracing::{error, info};

use bucketctl::cli::{self, Cli};
use bucketctl::config::Config;
use bucketctl::utils::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    cli.apply_overrides(&mut config);

    let _guard = init_logger(&config.logging)?;
    info!("Configuration loaded: {:?}", config.storage);

    if let Err(e) = cli::run(cli, &config).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}
