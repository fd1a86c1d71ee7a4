//! Convert command - run one file through the conversion pipeline and exit

use crate::cli::app::ConvertArgs;
use anyhow::{Context, Result, bail};
use hotfolders_core::config::watch_for;
use hotfolders_core::orchestrator::Extraction;
use hotfolders_core::{
    ConversionClient, HotfoldersConfig, IgnoreRegistry, JobOrchestrator, Timing, WatchConfig,
    ZamzarClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub async fn execute(config_path: &Path, args: ConvertArgs) -> Result<()> {
    // The file is named explicitly, so a missing configuration only loses defaults
    let config = if config_path.exists() {
        HotfoldersConfig::load(config_path)?
    } else {
        HotfoldersConfig::default()
    };

    let file = std::path::absolute(&args.file)
        .with_context(|| format!("Invalid path {}", args.file.display()))?;
    if !file.is_file() {
        bail!("{} is not a file", file.display());
    }

    let watch = plan(&config.watches()?, &file, &args)?;
    let client: Arc<dyn ConversionClient> = Arc::new(
        ZamzarClient::new(config.api_key()?, config.service.clone())
            .context("Failed to create conversion client")?,
    );
    let timing = Timing {
        settle_delay: Duration::ZERO,
        ..config.session_settings().timing
    };

    let orchestrator =
        JobOrchestrator::new(client, Arc::new(watch), Arc::new(IgnoreRegistry::new()))
            .with_timing(timing);
    let outcome = orchestrator.process(&file).await;

    for result in &outcome.results {
        match &result.result {
            Ok(delivered) => {
                println!(
                    "{}: {} ({} bytes)",
                    result.target_format,
                    delivered.path.display(),
                    delivered.bytes
                );
                match &delivered.extraction {
                    Extraction::Extracted(entries) => println!("  extracted {} entries", entries),
                    Extraction::Failed(reason) => println!("  extraction failed: {}", reason),
                    Extraction::NotRequested => {}
                }
            }
            Err(e) => println!("{}: failed: {}", result.target_format, e),
        }
    }
    println!("Source: {:?}", outcome.disposition);

    if !outcome.succeeded() {
        bail!("No conversion of {} succeeded", file.display());
    }
    Ok(())
}

/// Build the watch settings for a one-off conversion of `file`
fn plan(watches: &[WatchConfig], file: &Path, args: &ConvertArgs) -> Result<WatchConfig> {
    let dir = file.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    let mut watch = match watch_for(watches, file) {
        Some(configured) => configured.clone(),
        None => WatchConfig::new(&dir),
    };
    watch.path = dir;

    if !args.to.is_empty() {
        watch.target_formats = args.to.clone();
    }
    if args.extract {
        watch.options.auto_extract_archive = true;
    }
    if watch.target_formats.is_empty() {
        bail!(
            "No target format for {}: pass --to or add a watch entry for its directory",
            file.display()
        );
    }

    Ok(watch)
}
