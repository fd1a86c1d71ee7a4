//! Check command - validate the configuration without starting anything

use anyhow::{Result, bail};
use hotfolders_core::config::API_KEY_ENV;
use hotfolders_core::{HotfoldersConfig, WatchConfig};
use std::path::Path;

pub fn execute(config_path: &Path) -> Result<()> {
    let config = HotfoldersConfig::load(config_path)?;
    let watches = config.watches()?;

    println!("Configuration: {}", config_path.display());
    match config.api_key() {
        Ok(_) => println!("  API key: present"),
        Err(_) => println!("  API key: missing (set `api_key` or {})", API_KEY_ENV),
    }
    println!("  Service: {}", config.service.base_url);

    for watch in &watches {
        println!("{}", describe(watch));
    }

    let missing = watches.iter().filter(|w| !w.path.is_dir()).count();
    if missing > 0 {
        bail!("{} of {} watched directories do not exist", missing, watches.len());
    }
    config.api_key()?;

    Ok(())
}

fn describe(watch: &WatchConfig) -> String {
    let status = if watch.path.is_dir() { "ok" } else { "missing" };
    let sources: Vec<&str> = watch.source_formats.iter().map(String::as_str).collect();

    let mut line = format!(
        "  [{}] {}: {} -> {}",
        status,
        watch.path.display(),
        sources.join(", "),
        watch.target_formats.join(", ")
    );
    if watch.options.auto_extract_archive {
        line.push_str(" (extract zip)");
    }
    if watch.options.recursive_scan {
        line.push_str(" (recursive)");
    }
    if !watch.ignore_patterns.is_empty() {
        line.push_str(&format!(" (ignoring {})", watch.ignore_patterns.len()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_describe() {
        let dir = TempDir::new().unwrap();
        let watch = WatchConfig::new(dir.path())
            .from_format(".docx")
            .from_format(".doc")
            .to_format("pdf")
            .auto_extract(true);

        let line = describe(&watch);
        assert!(line.starts_with("  [ok]"));
        assert!(line.contains(".doc, .docx -> pdf"));
        assert!(line.ends_with("(extract zip)"));

        let missing = WatchConfig::new(dir.path().join("absent")).from_format(".a").to_format("b");
        assert!(describe(&missing).starts_with("  [missing]"));
    }

    #[test]
    fn test_execute_reports_missing_directory() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("hotfolders_config.json");
        let absent = dir.path().join("absent");
        let json = format!(
            r#"{{"api_key": "k", "conversions": {{"{}": {{"to": ["pdf"], "from": [".docx"]}}}}}}"#,
            absent.display()
        );
        std::fs::write(&config, json).unwrap();

        assert!(execute(&config).is_err());
    }

    #[test]
    fn test_execute_accepts_valid_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("hotfolders.toml");
        let toml = format!(
            "api_key = \"k\"\n\n[conversions.'{}']\nto = [\"pdf\"]\nfrom = [\".docx\"]\n",
            dir.path().display()
        );
        std::fs::write(&config, toml).unwrap();

        execute(&config).unwrap();
    }
}
