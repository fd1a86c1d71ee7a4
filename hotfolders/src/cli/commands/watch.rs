//! Watch command - monitor every configured directory until Ctrl-C

use anyhow::{Context, Result, bail};
use hotfolders_core::{ConversionClient, HotfoldersConfig, SessionRegistry, ZamzarClient};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn execute(config_path: &Path) -> Result<()> {
    let config = HotfoldersConfig::load(config_path)?;
    let watches = config.watches()?;
    if watches.is_empty() {
        bail!("No directories configured in {}", config_path.display());
    }

    let client: Arc<dyn ConversionClient> = Arc::new(
        ZamzarClient::new(config.api_key()?, config.service.clone())
            .context("Failed to create conversion client")?,
    );

    let registry = SessionRegistry::start(watches, client, &config.session_settings()).await?;
    for path in registry.paths() {
        println!("Monitoring {}", path.display());
    }

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");

    registry.shutdown().await;
    Ok(())
}
