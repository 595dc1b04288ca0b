use std::time::Duration;

use crate::application::data::ColorMode;
use crate::cli::Cli;
use crate::config::ViewerConfig;
use crate::session::DEFAULT_CONNECT_TIMEOUT;
use crate::view::DEFAULT_HIGHLIGHT;

const DEFAULT_HOST: &str = "localhost:8000";
const DEFAULT_NAME: &str = "local";
const DEFAULT_PATH: &str = "/";
const DEFAULT_EVENTS_PREFIX: &str = "/$events";
const DEFAULT_WERE_BACK: Duration = Duration::from_secs(8);

/// Effective settings: command line flags over the config file over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub host: String,
    pub name: String,
    pub path: String,
    pub events_prefix: String,
    pub secure: bool,
    pub highlight: Duration,
    pub were_back: Duration,
    pub connect_timeout: Duration,
    pub color: ColorMode,
}

impl RuntimeConfig {
    pub fn resolve(cli: Cli, file: ViewerConfig) -> Self {
        let path = cli
            .path
            .or(file.path)
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        Self {
            host: cli
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            name: cli
                .name
                .or(file.name)
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            path: normalize_path(&path),
            events_prefix: cli
                .events_prefix
                .or(file.events_prefix)
                .unwrap_or_else(|| DEFAULT_EVENTS_PREFIX.to_string()),
            secure: cli.secure || file.secure.unwrap_or(false),
            highlight: file
                .highlight_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_HIGHLIGHT),
            were_back: file
                .were_back_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WERE_BACK),
            connect_timeout: file
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            color: cli.color.or(file.color).unwrap_or_default(),
        }
    }
}

/// Watched subtrees always start and end with `/`.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
