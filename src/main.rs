use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use seedmirror::config::AppConfig;
use seedmirror::runner::Mirror;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()?;
    let mirror = Mirror::new(config)?;
    let processed = mirror.run().await?;

    info!("run complete, {processed} torrents processed");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
