use std::path::PathBuf;

use clap::Parser;

use crate::application::data::{ColorMode, LogLevel};

/// Live terminal viewer for a doozer-style hierarchical key-value store.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// host[:port] of the store's web endpoint
    #[clap(long)]
    pub host: Option<String>,

    /// Cluster name shown in the title
    #[clap(long, short)]
    pub name: Option<String>,

    /// Subtree to watch
    #[clap(long, short)]
    pub path: Option<String>,

    #[clap(long)]
    pub events_prefix: Option<String>,

    /// Connect with wss://
    #[clap(long)]
    pub secure: bool,

    /// Config file to read instead of ./dzview.yaml
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    #[clap(long, value_enum)]
    pub color: Option<ColorMode>,
}
