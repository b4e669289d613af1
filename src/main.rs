use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flipadelphia::{server, Config, FeatureStore};

/// flipadelphia flips your features
#[derive(Debug, Parser)]
#[command(name = "flipadelphia", version)]
struct Args {
    /// Path to the config file. Bare file names are looked up under
    /// $HOME/.flipadelphia.
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Named environment to load from the config file.
    #[arg(short, long, default_value = "development")]
    env: String,
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
                .init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::from_file(&args.config, &args.env)?;
    init_logging(&config)?;
    tracing::info!(environment = %config.environment_name, "loaded configuration");

    let store = Arc::new(FeatureStore::open(&config)?);
    tracing::info!(store = %store, "persistence store ready");
    let auth = server::auth::from_config(&config)?;

    server::serve(config.listen_on_port, store, auth).await?;
    Ok(())
}
