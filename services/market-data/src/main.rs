use anyhow::Context;
use market_data::{EngineConfig, MarketDataEngine};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = market_data::SERVICE_VERSION, "Starting market data engine");

    let config = EngineConfig::from_env();
    tracing::info!(
        save_dir = %config.save_dir.display(),
        active_threshold = config.active_threshold,
        "Configuration loaded"
    );

    let engine = MarketDataEngine::from_config(config).context("failed to initialize engine")?;
    let mut handles = engine.start();

    tokio::select! {
        res = &mut handles.discovery => {
            res.context("discovery loop terminated")?;
            anyhow::bail!("discovery loop exited");
        }
        res = &mut handles.refresh => {
            res.context("refresh loop terminated")?;
            anyhow::bail!("refresh loop exited");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
        }
    }

    // The final save queues behind any cycle save still in flight
    handles.shutdown().await;
    let bytes = engine.persist_now().context("final persist failed")?;
    tracing::info!(bytes, "Item store saved, exiting");

    Ok(())
}
