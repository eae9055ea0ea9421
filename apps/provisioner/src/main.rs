use anyhow::Result;
use tracing_subscriber::EnvFilter;

use streamsource_provisioner::build_router;
use streamsource_provisioner::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let bind_addr = config.bind_addr;
    let router = build_router(config)?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "streamsource provisioner listening");
    axum::serve(listener, router).await?;
    Ok(())
}
