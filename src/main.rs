use terminus::config::Config;
use terminus::server::registry::Registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cfg = Config::load()?;
    let registry = Registry::new();

    for spec in cfg.servers {
        let id = spec.id.clone();
        if let Err(e) = registry.start(spec).await {
            tracing::error!(id = %id, error = %format!("{e:#}"), "skipping server");
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    registry.stop_all();

    Ok(())
}
