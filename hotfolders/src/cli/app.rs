use clap::{Parser, Subcommand};
use hotfolders_core::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hotfolders",
    version,
    about = "Hotfolders - convert files dropped into watched directories",
    long_about = "Hotfolders watches directories for new files and converts each one through a remote conversion service, placing the results next to the source and removing the original."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file (JSON, or TOML with a .toml extension)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Defaults to `watch`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Default)]
pub enum Commands {
    /// Watch every configured directory until interrupted
    #[default]
    #[command(about = "Watch the configured directories and convert new files")]
    Watch,

    /// Validate the configuration
    #[command(about = "Load the configuration and report every watched directory")]
    Check,

    /// Convert a single file once
    #[command(about = "Convert one file and exit")]
    Convert(ConvertArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ConvertArgs {
    /// File to convert
    pub file: PathBuf,

    /// Target format; repeat for several. Defaults to the matching watch entry
    #[arg(long = "to", value_name = "FORMAT")]
    pub to: Vec<String>,

    /// Extract zip results next to the source
    #[arg(long)]
    pub extract: bool,
}
